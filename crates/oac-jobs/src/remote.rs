//! Remote automation clients.
//!
//! A client talks to one automation server and can hand out a runner per
//! remote job. [`RemoteConnectionService`] connects lazily and keeps one
//! client per server name.

#![allow(missing_docs)]

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::error::JobError;
use crate::queue::EventSender;
use crate::runner::AbstractDomainRunner;

pub trait AutomationClient {
    fn server_name(&self) -> &str;

    /// Jobs offered by the server.
    fn job_count(&self) -> usize;

    fn job_name(&self, index: usize) -> Option<String>;

    /// Controller for remote job `index`; its events are pushed to `sender`.
    fn create_runner(
        &self,
        index: usize,
        sender: EventSender,
    ) -> Result<Box<dyn AbstractDomainRunner>, JobError>;
}

/// Opens a client for a server name.
pub type Connector = Box<dyn Fn(&str) -> Result<Rc<dyn AutomationClient>, JobError>>;

pub struct RemoteConnectionService {
    connector: Connector,
    allowed: Vec<SmolStr>,
    clients: IndexMap<SmolStr, Rc<dyn AutomationClient>>,
}

impl RemoteConnectionService {
    #[must_use]
    pub fn new(connector: Connector) -> Self {
        Self {
            connector,
            allowed: Vec::new(),
            clients: IndexMap::new(),
        }
    }

    /// Restricts connections to `servers`; an empty list allows any name.
    #[must_use]
    pub fn with_allowed_servers(mut self, servers: Vec<SmolStr>) -> Self {
        self.allowed = servers;
        self
    }

    /// Existing client for `server`, or a freshly connected one.
    pub fn connect(&mut self, server: &str) -> Result<Rc<dyn AutomationClient>, JobError> {
        if let Some(client) = self.clients.get(server) {
            return Ok(Rc::clone(client));
        }
        if !self.allowed.is_empty() && !self.allowed.iter().any(|name| name == server) {
            return Err(JobError::Connection {
                server: server.into(),
                message: "server is not configured".into(),
            });
        }
        let client = (self.connector)(server).map_err(|err| match err {
            JobError::Connection { .. } => err,
            other => JobError::Connection {
                server: server.into(),
                message: other.to_string().into(),
            },
        })?;
        tracing::info!(server, jobs = client.job_count(), "connected to automation server");
        self.clients.insert(server.into(), Rc::clone(&client));
        Ok(client)
    }

    #[must_use]
    pub fn is_connected(&self, server: &str) -> bool {
        self.clients.contains_key(server)
    }

    /// Server names in connection order.
    pub fn servers(&self) -> impl Iterator<Item = &str> + '_ {
        self.clients.keys().map(SmolStr::as_str)
    }

    pub fn disconnect(&mut self, server: &str) -> bool {
        self.clients.shift_remove(server).is_some()
    }
}

impl fmt::Debug for RemoteConnectionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConnectionService")
            .field("allowed", &self.allowed)
            .field("servers", &self.clients.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct Idle(String);

    impl AutomationClient for Idle {
        fn server_name(&self) -> &str {
            &self.0
        }

        fn job_count(&self) -> usize {
            0
        }

        fn job_name(&self, _index: usize) -> Option<String> {
            None
        }

        fn create_runner(
            &self,
            index: usize,
            _sender: EventSender,
        ) -> Result<Box<dyn AbstractDomainRunner>, JobError> {
            Err(JobError::Remote(format!("no job {index}").into()))
        }
    }

    #[test]
    fn connects_once_per_server() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut service = RemoteConnectionService::new(Box::new(move |server| {
            counter.set(counter.get() + 1);
            Ok(Rc::new(Idle(server.to_string())) as Rc<dyn AutomationClient>)
        }));
        let first = service.connect("alpha").unwrap();
        let again = service.connect("alpha").unwrap();
        assert!(Rc::ptr_eq(&first, &again));
        service.connect("beta").unwrap();
        assert_eq!(calls.get(), 2);
        assert_eq!(service.servers().collect::<Vec<_>>(), ["alpha", "beta"]);
    }

    #[test]
    fn connector_failure_becomes_connection_error() {
        let mut service = RemoteConnectionService::new(Box::new(|_| {
            Err(JobError::Remote("refused".into()))
        }));
        let err = service.connect("alpha").err().unwrap();
        assert_eq!(
            err,
            JobError::Connection {
                server: "alpha".into(),
                message: "remote job error: refused".into(),
            }
        );
        assert!(!service.is_connected("alpha"));
    }

    #[test]
    fn unlisted_server_is_rejected() {
        let mut service = RemoteConnectionService::new(Box::new(|server| {
            Ok(Rc::new(Idle(server.to_string())) as Rc<dyn AutomationClient>)
        }))
        .with_allowed_servers(vec!["alpha".into()]);
        assert!(service.connect("alpha").is_ok());
        assert!(matches!(
            service.connect("gamma"),
            Err(JobError::Connection { .. })
        ));
    }
}
