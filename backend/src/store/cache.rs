//! Time-bounded cache of templates and their fields.
//!
//! Entries expire `ttl` after insertion as measured by the injected `Clock`,
//! and can be dropped explicitly with `invalidate` when a template changes.

use crate::error::AppError;
use common::model::field::Field;
use common::model::template::Template;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateBundle {
    pub template: Template,
    pub fields: Vec<Field>,
}

struct CachedBundle {
    bundle: TemplateBundle,
    inserted_at: Instant,
}

pub struct TemplateCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: HashMap<String, CachedBundle>,
}

impl TemplateCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, template_id: &str) -> Option<TemplateBundle> {
        let now = self.clock.now();
        let ttl = self.ttl;
        self.entries
            .retain(|_, v| now.saturating_duration_since(v.inserted_at) < ttl);
        self.entries.get(template_id).map(|e| e.bundle.clone())
    }

    pub fn insert(&mut self, bundle: TemplateBundle) {
        let inserted_at = self.clock.now();
        self.entries.insert(
            bundle.template.id.clone(),
            CachedBundle {
                bundle,
                inserted_at,
            },
        );
    }

    /// Returns the cached bundle or loads, caches and returns it.
    pub fn get_or_load<F>(&mut self, template_id: &str, load: F) -> Result<TemplateBundle, AppError>
    where
        F: FnOnce() -> Result<TemplateBundle, AppError>,
    {
        if let Some(bundle) = self.get(template_id) {
            return Ok(bundle);
        }
        let bundle = load()?;
        self.insert(bundle.clone());
        Ok(bundle)
    }

    pub fn invalidate(&mut self, template_id: &str) -> bool {
        self.entries.remove(template_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::template::Owner;
    use std::sync::Mutex;

    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    fn bundle(id: &str) -> TemplateBundle {
        TemplateBundle {
            template: Template {
                id: id.into(),
                name: "Course".into(),
                file_reference: "templates/course.png".into(),
                is_public: true,
                owner: Owner::User("u-1".into()),
            },
            fields: vec![Field::new("name", "Name")],
        }
    }

    fn cache() -> (TemplateCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock {
            now: Mutex::new(Instant::now()),
        });
        (
            TemplateCache::new(Duration::from_secs(60), clock.clone()),
            clock,
        )
    }

    #[test]
    fn entries_expire_after_ttl() {
        let (mut cache, clock) = cache();
        cache.insert(bundle("t1"));
        clock.advance(Duration::from_secs(59));
        assert!(cache.get("t1").is_some());
        clock.advance(Duration::from_secs(1));
        assert!(cache.get("t1").is_none());
    }

    #[test]
    fn get_or_load_loads_once_until_invalidated() {
        let (mut cache, _clock) = cache();
        let mut loads = 0;
        for _ in 0..3 {
            cache
                .get_or_load("t1", || {
                    loads += 1;
                    Ok(bundle("t1"))
                })
                .unwrap();
        }
        assert_eq!(loads, 1);

        assert!(cache.invalidate("t1"));
        cache
            .get_or_load("t1", || {
                loads += 1;
                Ok(bundle("t1"))
            })
            .unwrap();
        assert_eq!(loads, 2);
    }

    #[test]
    fn load_errors_are_not_cached() {
        let (mut cache, _clock) = cache();
        let err = cache.get_or_load("t1", || Err(AppError::not_found("Template", "t1")));
        assert!(err.is_err());
        assert!(cache.get("t1").is_none());
    }
}
