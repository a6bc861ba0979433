use entimap_core::host::memory::MemoryHost;
use entimap_core::host::{Database, OptionStore};
use entimap_core::schema::{
    ColumnDescriptor, ColumnParams, ColumnType, FieldDescriptor, FieldType, ModelKind, ModelSchema,
};
use entimap_core::{Manager, Model, Result, Value};
use entimap_store::{CustomTableRepository, SqliteDatabase, TableOptions};
use std::rc::Rc;

pub const TICKET: ModelKind = ModelKind::new("ticket");

fn summary(model: &mut Model) -> Result<Value> {
    let code = model.get("code")?.to_text();
    let title = model.get("title")?.to_text();
    Ok(Value::from(format!("{code}: {title}")))
}

/// Ticket rows: a key, a unique code, JSON columns and a read-only stamp
pub fn ticket_schema() -> ModelSchema {
    ModelSchema::builder(TICKET)
        .field(FieldDescriptor::new("id", FieldType::Int).column(ColumnDescriptor::id()))
        .field(
            FieldDescriptor::new("code", FieldType::String)
                .column(ColumnDescriptor::new().params(ColumnParams::Size(32)).unique()),
        )
        .field(FieldDescriptor::new("title", FieldType::String).column(ColumnDescriptor::new()))
        .field(FieldDescriptor::new("price", FieldType::Float).column(ColumnDescriptor::new()))
        .field(
            FieldDescriptor::new("tags", FieldType::Array)
                .column(ColumnDescriptor::new().sql_type(ColumnType::Json)),
        )
        .field(
            FieldDescriptor::new("active", FieldType::Bool)
                .default(true)
                .column(ColumnDescriptor::new().named("is_active")),
        )
        .field(
            FieldDescriptor::new("event_id", FieldType::Int)
                .nullable()
                .column(ColumnDescriptor::new().sql_type(ColumnType::BigInt).nullable()),
        )
        .field(
            FieldDescriptor::new("created_at", FieldType::String)
                .readonly()
                .column(ColumnDescriptor::new().sql_type(ColumnType::DateTime)),
        )
        .field(FieldDescriptor::new("summary", FieldType::String).computed(summary))
        .build()
        .unwrap()
}

/// A SQLite database, a manager over the in-memory host and a registered
/// ticket repository
pub struct Fixture {
    pub db: Rc<SqliteDatabase>,
    pub manager: Manager,
    pub tickets: Rc<CustomTableRepository>,
}

#[allow(dead_code)]
impl Fixture {
    pub fn ticket(&self, data: &[(&str, Value)]) -> Model {
        use entimap_core::Repository;
        let mut model = self.tickets.create(data).unwrap();
        self.tickets.save(&mut model).unwrap();
        model
    }

    pub fn row_count(&self) -> i64 {
        self.db
            .connection()
            .query_row(
                &format!("SELECT COUNT(*) FROM \"{}\"", self.tickets.prefixed_table_name()),
                [],
                |row| row.get(0),
            )
            .unwrap()
    }
}

#[allow(dead_code)]
pub fn setup() -> Fixture {
    setup_with(SqliteDatabase::open_in_memory().unwrap(), TableOptions::default())
}

pub fn setup_with(db: SqliteDatabase, options: TableOptions) -> Fixture {
    let db = Rc::new(db);
    let manager = Manager::new(MemoryHost::new().host());
    let tickets = Rc::new(repository(&db, ticket_schema(), options).unwrap());
    manager.register_shared(tickets.clone());
    Fixture {
        db,
        manager,
        tickets,
    }
}

pub fn repository(
    db: &Rc<SqliteDatabase>,
    schema: ModelSchema,
    options: TableOptions,
) -> Result<CustomTableRepository> {
    let database: Rc<dyn Database> = db.clone();
    let settings: Rc<dyn OptionStore> = db.clone();
    CustomTableRepository::new(Rc::new(schema), "tickets", database, settings, options)
}
