//! Scripted executor and walker for pipeline tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::driver::{CommandExecutor, Response};
use crate::error::{ChannelError, Result, SessionError, SnmpError};
use crate::platform::Vendor;
use crate::snmp::{Oid, SnmpWalker, Varbind};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Output(String),
    Timeout,
    Closed,
}

/// Answers commands from per-command queues, falling back to a default.
pub(crate) struct ScriptedExecutor {
    vendor: Vendor,
    replies: HashMap<String, VecDeque<Reply>>,
    default: Reply,
    pub log: Vec<String>,
    pub closed: bool,
}

impl ScriptedExecutor {
    pub fn new(vendor: Vendor) -> Self {
        Self {
            vendor,
            replies: HashMap::new(),
            default: Reply::Output(String::new()),
            log: vec![],
            closed: false,
        }
    }

    pub fn on(mut self, command: &str, reply: Reply) -> Self {
        self.replies
            .entry(command.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn output(self, command: &str, text: &str) -> Self {
        self.on(command, Reply::Output(text.to_string()))
    }

    pub fn with_default(mut self, reply: Reply) -> Self {
        self.default = reply;
        self
    }
}

impl CommandExecutor for ScriptedExecutor {
    async fn execute(&mut self, command: &str, timeout: Duration) -> Result<Response> {
        self.log.push(command.to_string());
        let reply = self
            .replies
            .get_mut(command)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default.clone());

        match reply {
            Reply::Output(text) => {
                let dialect = self.vendor.dialect();
                Ok(match dialect.detect_failure(&text) {
                    Some(marker) => Response::failed(command, text.clone(), text, "OLT#", Duration::ZERO, marker),
                    None => Response::new(command, text.clone(), text, "OLT#", Duration::ZERO),
                })
            }
            Reply::Timeout => Err(SessionError::CommandTimeout {
                command: command.to_string(),
                timeout,
            }
            .into()),
            Reply::Closed => Err(ChannelError::Closed.into()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Canned SNMP agent keyed by column OID; unknown columns time out.
#[derive(Default)]
pub(crate) struct MapWalker {
    pub columns: HashMap<Oid, Vec<Varbind>>,
}

impl SnmpWalker for MapWalker {
    async fn walk(&self, base: &Oid, timeout: Duration) -> std::result::Result<Vec<Varbind>, SnmpError> {
        self.columns.get(base).cloned().ok_or(SnmpError::Timeout {
            oid: base.to_string(),
            timeout,
        })
    }
}
