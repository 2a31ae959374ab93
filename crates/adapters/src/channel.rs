use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};

use gallery_ingest_application::{ApplicationError, Clock, JobHandler, JobPublisher};
use gallery_ingest_domain::{IngestionJob, JobMessage};
use tracing::{error, info, warn};

type SenderSlot = Arc<Mutex<Option<mpsc::Sender<String>>>>;

/// In-process stand-in for a message broker. Jobs travel as their JSON wire
/// form to a fixed set of consumer threads; there is no redelivery.
pub struct InProcessJobChannel {
    sender: SenderSlot,
    receiver: Arc<Mutex<mpsc::Receiver<String>>>,
    consumers: Mutex<Vec<JoinHandle<()>>>,
}

/// Producer handle for [`InProcessJobChannel`].
#[derive(Clone)]
pub struct ChannelPublisher {
    sender: SenderSlot,
}

impl InProcessJobChannel {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel::<String>();
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
            receiver: Arc::new(Mutex::new(receiver)),
            consumers: Mutex::new(Vec::new()),
        }
    }

    pub fn publisher(&self) -> ChannelPublisher {
        ChannelPublisher {
            sender: Arc::clone(&self.sender),
        }
    }

    /// Spawns `count` consumers that decode each payload and hand the job to
    /// `handler`. `clock` stands in for the submission time of messages that
    /// were published without one.
    pub fn start_consumers(
        &self,
        count: usize,
        handler: Arc<dyn JobHandler>,
        clock: Arc<dyn Clock>,
    ) -> Result<(), ApplicationError> {
        if count == 0 {
            return Err(ApplicationError::Configuration(
                "channel needs at least one consumer".to_string(),
            ));
        }
        let mut consumers = self
            .consumers
            .lock()
            .map_err(|_| ApplicationError::Channel("consumer list lock poisoned".to_string()))?;
        for index in 0..count {
            let receiver = Arc::clone(&self.receiver);
            let handler = Arc::clone(&handler);
            let clock = Arc::clone(&clock);
            let handle = thread::Builder::new()
                .name(format!("ingest-consumer-{index}"))
                .spawn(move || consume(&receiver, handler.as_ref(), clock.as_ref()))
                .map_err(|error| ApplicationError::Channel(error.to_string()))?;
            consumers.push(handle);
        }
        info!(consumers = count, "job consumers started");
        Ok(())
    }

    /// Closes the queue, lets consumers drain what was already published and
    /// waits for them to exit.
    pub fn shutdown(&self) -> Result<(), ApplicationError> {
        self.sender
            .lock()
            .map_err(|_| ApplicationError::Channel("sender lock poisoned".to_string()))?
            .take();

        let handles: Vec<JoinHandle<()>> = self
            .consumers
            .lock()
            .map_err(|_| ApplicationError::Channel("consumer list lock poisoned".to_string()))?
            .drain(..)
            .collect();
        for handle in handles {
            handle
                .join()
                .map_err(|_| ApplicationError::Channel("consumer thread panicked".to_string()))?;
        }
        info!("job channel shut down");
        Ok(())
    }
}

impl Default for InProcessJobChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl JobPublisher for ChannelPublisher {
    fn publish(&self, job: &IngestionJob) -> Result<(), ApplicationError> {
        let payload = serde_json::to_string(&JobMessage::from(job))
            .map_err(|error| ApplicationError::Channel(error.to_string()))?;

        let sent = match self.sender.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(sender) => sender
                    .send(payload)
                    .map_err(|_| "all consumers are gone".to_string()),
                None => Err("channel is shut down".to_string()),
            },
            Err(_) => Err("sender lock poisoned".to_string()),
        };

        match sent {
            Ok(()) => {
                info!(message_id = %job.message_id, "job message acknowledged");
                Ok(())
            }
            Err(reason) => {
                error!(message_id = %job.message_id, reason = %reason, "job message not delivered");
                Err(ApplicationError::Channel(reason))
            }
        }
    }
}

fn consume(receiver: &Mutex<mpsc::Receiver<String>>, handler: &dyn JobHandler, clock: &dyn Clock) {
    loop {
        let payload = match receiver.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => return,
        };
        let Ok(payload) = payload else {
            return;
        };

        let job = match serde_json::from_str::<JobMessage>(&payload) {
            Ok(message) => message.into_job(clock.now_millis()),
            Err(error) => {
                warn!(error = %error, "undecodable job message dropped");
                continue;
            }
        };

        match handler.handle(&job) {
            Ok(report) => info!(
                message_id = %job.message_id,
                files = report.files,
                elapsed_ms = report.elapsed_ms,
                "job consumed"
            ),
            Err(err) => error!(
                message_id = %job.message_id,
                error = %err,
                "job failed, redelivery delegated to broker"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use gallery_ingest_application::IngestionReport;

    use super::*;
    use crate::SystemClock;

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<IngestionJob>>,
        fail: bool,
    }

    impl JobHandler for RecordingHandler {
        fn handle(&self, job: &IngestionJob) -> Result<IngestionReport, ApplicationError> {
            self.seen.lock().expect("lock").push(job.clone());
            if self.fail {
                return Err(ApplicationError::Io("disk full".to_string()));
            }
            Ok(IngestionReport {
                message_id: job.message_id.clone(),
                files: job.file_names.len(),
                ..IngestionReport::default()
            })
        }
    }

    fn job(id: &str) -> IngestionJob {
        IngestionJob {
            message_id: id.to_string(),
            file_names: vec!["a.jpg".to_string(), "b.png".to_string()],
            staging_dir: PathBuf::from("/tmp/staging"),
            default_rating: 1,
            overwrite: true,
            submitted_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn every_published_job_reaches_a_consumer_intact() {
        let channel = InProcessJobChannel::new();
        let handler = Arc::new(RecordingHandler::default());
        channel
            .start_consumers(3, handler.clone(), Arc::new(SystemClock))
            .expect("start");
        let publisher = channel.publisher();

        for id in ["m-1", "m-2", "m-3", "m-4"] {
            publisher.publish(&job(id)).expect("publish");
        }
        channel.shutdown().expect("shutdown");

        let mut seen = handler.seen.lock().expect("lock").clone();
        seen.sort_by(|a, b| a.message_id.cmp(&b.message_id));
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], job("m-1"));
    }

    #[test]
    fn failed_jobs_do_not_stop_the_consumer() {
        let channel = InProcessJobChannel::new();
        let handler = Arc::new(RecordingHandler {
            fail: true,
            ..RecordingHandler::default()
        });
        channel
            .start_consumers(1, handler.clone(), Arc::new(SystemClock))
            .expect("start");

        channel.publisher().publish(&job("m-1")).expect("publish");
        channel.publisher().publish(&job("m-2")).expect("publish");
        channel.shutdown().expect("shutdown");

        assert_eq!(handler.seen.lock().expect("lock").len(), 2);
    }

    #[test]
    fn undecodable_payloads_are_skipped() {
        let channel = InProcessJobChannel::new();
        let handler = Arc::new(RecordingHandler::default());
        channel
            .start_consumers(1, handler.clone(), Arc::new(SystemClock))
            .expect("start");

        channel
            .sender
            .lock()
            .expect("lock")
            .as_ref()
            .expect("open")
            .send("{not json".to_string())
            .expect("send");
        channel.publisher().publish(&job("m-1")).expect("publish");
        channel.shutdown().expect("shutdown");

        let seen = handler.seen.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].message_id, "m-1");
    }

    #[test]
    fn publishing_after_shutdown_is_a_channel_error() {
        let channel = InProcessJobChannel::new();
        channel.shutdown().expect("shutdown");

        assert!(matches!(
            channel.publisher().publish(&job("late")),
            Err(ApplicationError::Channel(_))
        ));
    }

    #[test]
    fn zero_consumers_is_rejected() {
        let channel = InProcessJobChannel::new();
        let handler: Arc<dyn JobHandler> = Arc::new(RecordingHandler::default());
        assert!(matches!(
            channel.start_consumers(0, handler, Arc::new(SystemClock)),
            Err(ApplicationError::Configuration(_))
        ));
    }
}
