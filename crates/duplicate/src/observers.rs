use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::events::{DuplicationObserver, HookOutcome};
use crate::record::Record;

/// Ordered observers for one model
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    observers: Vec<Arc<dyn DuplicationObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    pub fn register(&mut self, observer: Arc<dyn DuplicationObserver>) {
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Stops at the first veto; later observers are not called
    pub async fn trigger_duplicating(&self, original: &Record) -> HookOutcome {
        for observer in &self.observers {
            if observer.duplicating(original).await.is_veto() {
                return HookOutcome::Veto;
            }
        }
        HookOutcome::Proceed
    }

    pub async fn trigger_duplicated(&self, original: &Record, duplicate: &Record) {
        for observer in &self.observers {
            observer.duplicated(original, duplicate).await;
        }
    }
}

struct DuplicatingFn<F>(F);

#[async_trait]
impl<F> DuplicationObserver for DuplicatingFn<F>
where
    F: Fn(&Record) -> HookOutcome + Send + Sync,
{
    async fn duplicating(&self, original: &Record) -> HookOutcome {
        (self.0)(original)
    }
}

struct DuplicatedFn<F>(F);

#[async_trait]
impl<F> DuplicationObserver for DuplicatedFn<F>
where
    F: Fn(&Record, &Record) + Send + Sync,
{
    async fn duplicated(&self, original: &Record, duplicate: &Record) {
        (self.0)(original, duplicate)
    }
}

/// `duplicating` / `duplicated` hooks, per model name
#[derive(Clone, Default)]
pub struct DuplicationHooks {
    registries: Arc<DashMap<String, ObserverRegistry>>,
}

impl DuplicationHooks {
    pub fn new() -> Self {
        Self {
            registries: Arc::new(DashMap::new()),
        }
    }

    pub fn register_observer(&self, model: &str, observer: Arc<dyn DuplicationObserver>) {
        self.registries
            .entry(model.to_string())
            .or_insert_with(ObserverRegistry::new)
            .register(observer);
    }

    /// Register a `duplicating` callback for `model`
    pub fn on_duplicating<F>(&self, model: &str, callback: F)
    where
        F: Fn(&Record) -> HookOutcome + Send + Sync + 'static,
    {
        self.register_observer(model, Arc::new(DuplicatingFn(callback)));
    }

    /// Register a `duplicated` callback for `model`
    pub fn on_duplicated<F>(&self, model: &str, callback: F)
    where
        F: Fn(&Record, &Record) + Send + Sync + 'static,
    {
        self.register_observer(model, Arc::new(DuplicatedFn(callback)));
    }

    pub fn has_observers_for(&self, model: &str) -> bool {
        self.registries
            .get(model)
            .map(|registry| registry.observer_count() > 0)
            .unwrap_or(false)
    }

    pub fn observer_count(&self, model: &str) -> usize {
        self.registries
            .get(model)
            .map(|registry| registry.observer_count())
            .unwrap_or(0)
    }

    // Observers are cloned out so no map guard is held across an await.
    fn registry_for(&self, model: &str) -> Option<ObserverRegistry> {
        self.registries.get(model).map(|registry| registry.clone())
    }

    pub async fn trigger_duplicating(&self, model: &str, original: &Record) -> HookOutcome {
        match self.registry_for(model) {
            Some(registry) => registry.trigger_duplicating(original).await,
            None => HookOutcome::Proceed,
        }
    }

    pub async fn trigger_duplicated(&self, model: &str, original: &Record, duplicate: &Record) {
        if let Some(registry) = self.registry_for(model) {
            registry.trigger_duplicated(original, duplicate).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct EventTracker {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl EventTracker {
        fn new() -> Self {
            Self {
                events: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn track(&self, event: &str) {
            self.events.lock().unwrap().push(event.to_string());
        }

        fn get_events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    struct TrackingObserver {
        tracker: EventTracker,
        name: String,
        outcome: HookOutcome,
    }

    impl TrackingObserver {
        fn new(name: &str, tracker: EventTracker, outcome: HookOutcome) -> Self {
            Self {
                tracker,
                name: name.to_string(),
                outcome,
            }
        }
    }

    #[async_trait]
    impl DuplicationObserver for TrackingObserver {
        async fn duplicating(&self, original: &Record) -> HookOutcome {
            self.tracker
                .track(&format!("{}: duplicating {}", self.name, original.table()));
            self.outcome
        }

        async fn duplicated(&self, original: &Record, _duplicate: &Record) {
            self.tracker
                .track(&format!("{}: duplicated {}", self.name, original.table()));
        }
    }

    #[tokio::test]
    async fn test_observer_registry_execution_order() {
        let tracker = EventTracker::new();
        let mut registry = ObserverRegistry::new();
        registry.register(Arc::new(TrackingObserver::new(
            "observer1",
            tracker.clone(),
            HookOutcome::Proceed,
        )));
        registry.register(Arc::new(TrackingObserver::new(
            "observer2",
            tracker.clone(),
            HookOutcome::Proceed,
        )));

        let record = Record::new("posts");
        assert_eq!(registry.trigger_duplicating(&record).await, HookOutcome::Proceed);
        registry.trigger_duplicated(&record, &record).await;

        assert_eq!(
            tracker.get_events(),
            vec![
                "observer1: duplicating posts",
                "observer2: duplicating posts",
                "observer1: duplicated posts",
                "observer2: duplicated posts",
            ]
        );
    }

    #[tokio::test]
    async fn test_veto_stops_later_observers() {
        let tracker = EventTracker::new();
        let mut registry = ObserverRegistry::new();
        registry.register(Arc::new(TrackingObserver::new(
            "vetoer",
            tracker.clone(),
            HookOutcome::Veto,
        )));
        registry.register(Arc::new(TrackingObserver::new(
            "observer2",
            tracker.clone(),
            HookOutcome::Proceed,
        )));

        let outcome = registry.trigger_duplicating(&Record::new("posts")).await;

        assert_eq!(outcome, HookOutcome::Veto);
        assert_eq!(tracker.get_events(), vec!["vetoer: duplicating posts"]);
    }

    #[tokio::test]
    async fn test_hooks_are_scoped_per_model() {
        let hooks = DuplicationHooks::new();
        hooks.on_duplicating("Post", |_| HookOutcome::Veto);

        let record = Record::new("posts");
        assert_eq!(hooks.trigger_duplicating("Post", &record).await, HookOutcome::Veto);
        assert_eq!(
            hooks.trigger_duplicating("Comment", &record).await,
            HookOutcome::Proceed
        );
        assert!(hooks.has_observers_for("Post"));
        assert!(!hooks.has_observers_for("Comment"));
    }

    #[tokio::test]
    async fn test_closure_hooks_are_additive() {
        let tracker = EventTracker::new();
        let hooks = DuplicationHooks::new();

        let first = tracker.clone();
        hooks.on_duplicating("Post", move |_| {
            first.track("first");
            HookOutcome::Proceed
        });
        let second = tracker.clone();
        hooks.on_duplicating("Post", move |_| {
            second.track("second");
            true.into()
        });
        let third = tracker.clone();
        hooks.on_duplicated("Post", move |_, duplicate| {
            third.track(&format!("duplicated into {}", duplicate.table()));
        });

        assert_eq!(hooks.observer_count("Post"), 3);

        let record = Record::new("posts");
        assert_eq!(hooks.trigger_duplicating("Post", &record).await, HookOutcome::Proceed);
        hooks.trigger_duplicated("Post", &record, &record).await;

        assert_eq!(
            tracker.get_events(),
            vec!["first", "second", "duplicated into posts"]
        );
    }
}
