use crate::communication::messages::AlertMessage;
use crate::errors::AlertError;
use crate::monitoring::journal::log_to_csv;
use crate::shared_data::{current_timestamp, AlertRecord};
use amiquip::{Connection, Exchange, Publish, QueueDeclareOptions};
use std::path::PathBuf;

/// Delivers accident alerts to an operator.
pub trait AlertDispatcher {
    fn send_alert(&mut self, destination_id: &str, message: &str) -> Result<(), AlertError>;
}

impl<T: AlertDispatcher + ?Sized> AlertDispatcher for Box<T> {
    fn send_alert(&mut self, destination_id: &str, message: &str) -> Result<(), AlertError> {
        (**self).send_alert(destination_id, message)
    }
}

/// Publishes each alert as JSON on an AMQP queue.
#[derive(Debug, Clone)]
pub struct AmqpAlertDispatcher {
    amqp_url: String,
    queue: String,
}

impl AmqpAlertDispatcher {
    pub fn new(amqp_url: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            amqp_url: amqp_url.into(),
            queue: queue.into(),
        }
    }
}

impl AlertDispatcher for AmqpAlertDispatcher {
    fn send_alert(&mut self, destination_id: &str, message: &str) -> Result<(), AlertError> {
        let alert = AlertMessage {
            timestamp: current_timestamp(),
            destination_id: destination_id.to_string(),
            message: message.to_string(),
        };
        let payload = serde_json::to_string(&alert)?;

        let mut connection = Connection::insecure_open(&self.amqp_url)?;
        let channel = connection.open_channel(None)?;
        channel.queue_declare(self.queue.as_str(), QueueDeclareOptions::default())?;
        let exchange = Exchange::direct(&channel);
        exchange.publish(Publish::new(payload.as_bytes(), self.queue.as_str()))?;
        log::info!("[Alerts] Published alert to '{}': {}", self.queue, message);
        connection.close()?;
        Ok(())
    }
}

/// Writes alerts to the log only.
#[derive(Debug, Default, Clone)]
pub struct LogAlertDispatcher;

impl AlertDispatcher for LogAlertDispatcher {
    fn send_alert(&mut self, destination_id: &str, message: &str) -> Result<(), AlertError> {
        log::warn!("[Alerts] to {}: {}", destination_id, message);
        Ok(())
    }
}

/// Records every alert attempt in a CSV journal before returning the inner result.
#[derive(Debug)]
pub struct JournaledAlerts<D> {
    inner: D,
    journal: PathBuf,
}

impl<D: AlertDispatcher> JournaledAlerts<D> {
    pub fn new(inner: D, journal: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            journal: journal.into(),
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: AlertDispatcher> AlertDispatcher for JournaledAlerts<D> {
    fn send_alert(&mut self, destination_id: &str, message: &str) -> Result<(), AlertError> {
        let result = self.inner.send_alert(destination_id, message);
        let record = AlertRecord {
            timestamp: current_timestamp(),
            destination_id: destination_id.to_string(),
            message: message.to_string(),
            delivered: result.is_ok(),
            error: result
                .as_ref()
                .err()
                .map(|e| e.to_string())
                .unwrap_or_default(),
        };
        if let Err(e) = log_to_csv(&self.journal, &record) {
            log::error!("Error logging alert: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::journal::read_csv;

    struct Flaky {
        fail: bool,
    }

    impl AlertDispatcher for Flaky {
        fn send_alert(&mut self, _: &str, _: &str) -> Result<(), AlertError> {
            if self.fail {
                Err(AlertError::Transport("bot unreachable".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn journal_records_delivery_outcome() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("alert_log.csv");

        let mut ok = JournaledAlerts::new(Flaky { fail: false }, &path);
        ok.send_alert("ops", "first").unwrap();
        let mut failing = JournaledAlerts::new(Flaky { fail: true }, &path);
        assert!(failing.send_alert("ops", "second").is_err());

        let rows: Vec<AlertRecord> = read_csv(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].message, "first");
        assert!(rows[0].delivered);
        assert!(!rows[1].delivered);
        assert!(rows[1].error.contains("bot unreachable"));
    }

    #[test]
    fn log_dispatcher_always_succeeds() {
        assert!(LogAlertDispatcher.send_alert("ops", "hello").is_ok());
    }
}
