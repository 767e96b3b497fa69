//! Operator notifications
//!
//! The orchestrators report lifecycle events (start, per-file result,
//! critical index failures, summary) through a single-method capability so
//! any front end can render them.

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

impl<F> Notifier for F
where
    F: Fn(&str) + Send + Sync,
{
    fn notify(&self, message: &str) {
        self(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_is_a_notifier() {
        let seen = Mutex::new(Vec::new());
        let notifier = |msg: &str| seen.lock().unwrap().push(msg.to_string());

        notifier.notify("Starting");
        Notifier::notify(&notifier, "Done");

        assert_eq!(*seen.lock().unwrap(), vec!["Starting", "Done"]);
    }
}
