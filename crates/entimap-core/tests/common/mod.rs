use entimap_core::catalog::{self, POST};
use entimap_core::host::memory::{MemoryEntityStore, MemoryHost};
use entimap_core::host::Record;
use entimap_core::{Lookup, Manager, Model, Repository, Value};
use std::rc::Rc;

/// In-memory host plus a manager with the default catalog registered
pub struct Fixture {
    pub host: MemoryHost,
    pub manager: Manager,
}

#[allow(dead_code)]
impl Fixture {
    pub fn store(&self, family: &str) -> Rc<MemoryEntityStore> {
        self.host.store(family).unwrap()
    }

    pub fn posts(&self) -> Rc<MemoryEntityStore> {
        self.store("post")
    }

    pub fn repo(&self, kind: entimap_core::ModelKind) -> Rc<dyn Repository> {
        self.manager.get_model_repository(kind).unwrap()
    }

    /// Seed a published post and return its id
    pub fn seed_post(&self, title: &str, slug: &str) -> Value {
        self.seed_post_with_parent(title, slug, 0)
    }

    pub fn seed_post_with_parent(&self, title: &str, slug: &str, parent: i64) -> Value {
        self.posts().seed(
            Record::new()
                .with("post_title", title)
                .with("post_name", slug)
                .with("post_type", "post")
                .with("post_status", "publish")
                .with("post_date", "2024-03-01 09:30:00")
                .with("post_author", 0)
                .with("post_parent", parent),
        )
    }

    pub fn seed_term(&self, taxonomy: &str, name: &str, slug: &str) -> Value {
        self.store("term").seed(
            Record::new()
                .with("name", name)
                .with("slug", slug)
                .with("taxonomy", taxonomy)
                .with("parent", 0)
                .with("count", 0),
        )
    }

    pub fn load_post(&self, id: &Value) -> Model {
        self.repo(POST)
            .get(Lookup::Id(id.clone()))
            .unwrap()
            .expect("seeded post should load")
    }
}

/// Fresh host and manager with every catalog repository registered
#[allow(dead_code)]
pub fn setup() -> Fixture {
    let host = MemoryHost::new();
    let manager = Manager::new(host.host());
    catalog::register_defaults(&manager).unwrap();
    Fixture { host, manager }
}
