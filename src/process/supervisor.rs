//! Ordered start and reverse-ordered stop of services.

use tracing::{error, info};

use super::Service;
use crate::PlayResult;

/// Owns the services of one launcher session
#[derive(Default)]
pub struct Supervisor {
    services: Vec<Box<dyn Service>>,
    started: usize,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a service; services start in the order they were added
    pub fn add(&mut self, service: Box<dyn Service>) {
        self.services.push(service);
    }

    /// Take over a service that was started elsewhere; it is stopped like the others
    pub fn adopt(&mut self, service: Box<dyn Service>) {
        self.services.insert(self.started, service);
        self.started += 1;
    }

    /// Start every queued service that is not running yet.
    ///
    /// If one fails, the ones already started are stopped before the error is returned.
    pub async fn start_all(&mut self) -> PlayResult<()> {
        while self.started < self.services.len() {
            let service = &mut self.services[self.started];
            info!("Starting {}", service.name());
            if let Err(e) = service.start().await {
                error!("{} failed to start: {}", service.name(), e);
                // The failed service may have left a child behind
                let _ = service.stop().await;
                self.stop_all().await;
                return Err(e);
            }
            info!("{} is up", service.name());
            self.started += 1;
        }
        Ok(())
    }

    /// Stop started services in reverse order. Idempotent.
    pub async fn stop_all(&mut self) {
        while self.started > 0 {
            self.started -= 1;
            let service = &mut self.services[self.started];
            info!("Stopping {}", service.name());
            if let Err(e) = service.stop().await {
                error!("Failed to stop {}: {}", service.name(), e);
            }
        }
    }

    pub fn running(&self) -> impl Iterator<Item = &dyn Service> {
        self.services[..self.started].iter().map(|s| s.as_ref())
    }

    /// Pid of a running service by name
    pub fn pid_of(&self, name: &str) -> Option<u32> {
        self.running().find(|s| s.name() == name).and_then(|s| s.pid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::MockService;
    use crate::PlayError;
    use mockall::Sequence;

    fn mock(name: &'static str) -> MockService {
        let mut service = MockService::new();
        service.expect_name().return_const(name.to_string());
        service.expect_pid().return_const(Some(42u32));
        service
    }

    #[tokio::test]
    async fn test_stops_in_reverse_order() {
        let mut seq = Sequence::new();
        let mut questdb = mock("questdb");
        let mut jupyter = mock("jupyterlab");

        questdb.expect_start().times(1).in_sequence(&mut seq).returning(|| Ok(()));
        jupyter.expect_start().times(1).in_sequence(&mut seq).returning(|| Ok(()));
        jupyter.expect_stop().times(1).in_sequence(&mut seq).returning(|| Ok(()));
        questdb.expect_stop().times(1).in_sequence(&mut seq).returning(|| Ok(()));

        let mut supervisor = Supervisor::new();
        supervisor.add(Box::new(questdb));
        supervisor.add(Box::new(jupyter));

        supervisor.start_all().await.unwrap();
        assert_eq!(supervisor.running().count(), 2);
        assert_eq!(supervisor.pid_of("questdb"), Some(42));

        supervisor.stop_all().await;
        // Already stopped: no further stop calls expected
        supervisor.stop_all().await;
        assert_eq!(supervisor.running().count(), 0);
    }

    #[tokio::test]
    async fn test_adopted_service_is_stopped_last() {
        let mut seq = Sequence::new();
        let mut questdb = mock("questdb");
        let mut jupyter = mock("jupyterlab");

        questdb.expect_start().never();
        jupyter.expect_start().times(1).in_sequence(&mut seq).returning(|| Ok(()));
        jupyter.expect_stop().times(1).in_sequence(&mut seq).returning(|| Ok(()));
        questdb.expect_stop().times(1).in_sequence(&mut seq).returning(|| Ok(()));

        let mut supervisor = Supervisor::new();
        supervisor.add(Box::new(jupyter));
        supervisor.adopt(Box::new(questdb));
        assert_eq!(supervisor.running().count(), 1);

        supervisor.start_all().await.unwrap();
        supervisor.stop_all().await;
    }

    #[tokio::test]
    async fn test_failed_start_stops_started_services() {
        let mut questdb = mock("questdb");
        let mut jupyter = mock("jupyterlab");

        questdb.expect_start().times(1).returning(|| Ok(()));
        questdb.expect_stop().times(1).returning(|| Ok(()));
        jupyter
            .expect_start()
            .times(1)
            .returning(|| Err(PlayError::timeout("jupyterlab did not answer")));
        jupyter.expect_stop().times(1).returning(|| Ok(()));

        let mut supervisor = Supervisor::new();
        supervisor.add(Box::new(questdb));
        supervisor.add(Box::new(jupyter));

        let result = supervisor.start_all().await;
        assert!(matches!(result, Err(PlayError::Timeout { .. })));
        assert_eq!(supervisor.running().count(), 0);
    }
}
