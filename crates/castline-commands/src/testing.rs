//! Test doubles shared by the handler and router tests.

use async_trait::async_trait;
use castline_channels::Session;
use castline_core::config::{AlertConfig, CommandsConfig};
use castline_core::error::{CastlineError, Result};
use castline_core::traits::{MessagingGateway, RecipientDirectory};
use castline_core::types::{DirectoryEntry, Payload};
use castline_core::{NumberingPlan, Shutdown};
use castline_scheduler::{BroadcastDispatcher, DispatchPolicy, RecipientRegistry};
use castline_security::Allowlist;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::command::CommandSyntax;
use crate::handler::{CommandHandler, Invocation};
use crate::registry::HandlerRegistry;
use crate::router::CommandRouter;
use crate::services::Services;

pub const OPERATOR: &str = "5492664031203";
pub const CUSTOMER: &str = "5491122334455";

type Outbox = Arc<Mutex<Vec<(String, Payload)>>>;

/// Records every payload; fails for listed recipients or for any media.
pub struct FakeGateway {
    outbox: Outbox,
    failing: HashSet<String>,
    fail_media: bool,
}

#[async_trait]
impl MessagingGateway for FakeGateway {
    fn name(&self) -> &str {
        "fake"
    }

    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, recipient: &str, payload: &Payload) -> Result<()> {
        if self.failing.contains(recipient) {
            return Err(CastlineError::Delivery(format!("{recipient} unreachable")));
        }
        if self.fail_media && matches!(payload, Payload::Media { .. }) {
            return Err(CastlineError::Delivery("media rejected".into()));
        }
        self.outbox
            .lock()
            .unwrap()
            .push((recipient.to_string(), payload.clone()));
        Ok(())
    }
}

pub enum FakeDirectory {
    Entries(Vec<DirectoryEntry>),
    Down,
}

#[async_trait]
impl RecipientDirectory for FakeDirectory {
    async fn fetch(&self) -> Result<Vec<DirectoryEntry>> {
        match self {
            Self::Entries(entries) => Ok(entries.clone()),
            Self::Down => Err(CastlineError::DirectoryUnavailable("connection refused".into())),
        }
    }
}

pub struct HarnessBuilder {
    name: String,
    directory: Option<FakeDirectory>,
    failing: HashSet<String>,
    fail_media: bool,
    connected: bool,
    alerts: Option<Vec<AlertConfig>>,
    extra: Vec<Arc<dyn CommandHandler>>,
}

impl HarnessBuilder {
    pub fn directory(mut self, directory: FakeDirectory) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn failing(mut self, number: &str) -> Self {
        self.failing.insert(number.to_string());
        self
    }

    pub fn fail_media(mut self) -> Self {
        self.fail_media = true;
        self
    }

    /// Leave the session in `Connecting`.
    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    pub fn alerts(mut self, alerts: Vec<AlertConfig>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn handler(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.extra.push(handler);
        self
    }

    pub async fn build(self) -> Harness {
        let dir = std::env::temp_dir().join(format!(
            "castline-test-commands-{}-{}",
            std::process::id(),
            self.name
        ));
        std::fs::remove_dir_all(&dir).ok();

        let outbox: Outbox = Arc::default();
        let gateway = FakeGateway {
            outbox: outbox.clone(),
            failing: self.failing,
            fail_media: self.fail_media,
        };
        let session = Arc::new(Session::new(Box::new(gateway), Duration::from_secs(5)));
        if self.connected {
            session.connect().await.unwrap();
        }

        let plan = NumberingPlan::default();
        let registry =
            Arc::new(RecipientRegistry::open(&dir.join("recipients.json"), plan.clone()).await);
        let shutdown = Shutdown::new();
        let policy = DispatchPolicy {
            max_delay: Duration::ZERO,
            ..DispatchPolicy::default()
        };

        let mut commands = CommandsConfig::default();
        if let Some(alerts) = self.alerts {
            commands.alerts = alerts;
        }

        let services = Arc::new(Services {
            session,
            registry,
            allowlist: Arc::new(Allowlist::new([OPERATOR])),
            directory: self
                .directory
                .map(|d| Arc::new(d) as Arc<dyn RecipientDirectory>),
            dispatcher: Arc::new(BroadcastDispatcher::new(policy, shutdown.clone())),
            numbering: plan,
            syntax: CommandSyntax::from(&commands),
            broadcast_prefix: commands.broadcast_prefix.clone(),
            directory_timeout: Duration::from_secs(1),
        });

        let mut handlers = HandlerRegistry::with_defaults(&commands);
        for handler in self.extra {
            handlers.register(handler);
        }

        Harness {
            router: CommandRouter::new(handlers, services),
            outbox,
            shutdown,
            dir,
        }
    }
}

/// A router wired to fakes, with a registry in a private temp directory.
pub struct Harness {
    pub router: CommandRouter,
    pub shutdown: Shutdown,
    outbox: Outbox,
    dir: PathBuf,
}

impl Harness {
    pub fn builder(name: &str) -> HarnessBuilder {
        HarnessBuilder {
            name: name.to_string(),
            directory: None,
            failing: HashSet::new(),
            fail_media: false,
            connected: true,
            alerts: None,
            extra: Vec::new(),
        }
    }

    pub fn services(&self) -> &Services {
        self.router.services()
    }

    pub async fn route_as_operator(&self, raw: &str) -> Result<()> {
        self.router.route(&Invocation::from_number(OPERATOR), raw).await
    }

    pub fn sent(&self) -> Vec<(String, Payload)> {
        self.outbox.lock().unwrap().clone()
    }

    /// Text bodies delivered to `number`, in order.
    pub fn texts_to(&self, number: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(r, _)| r == number)
            .filter_map(|(_, p)| match p {
                Payload::Text { text } => Some(text),
                Payload::Media { .. } => None,
            })
            .collect()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}
