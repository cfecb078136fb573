//! Vendor dialect tables.

use regex::bytes::Regex;

use crate::channel::compile_prompt_pattern;
use crate::model::PonPortAddress;
use crate::snmp::OidMap;

/// Placeholder replaced by the rendered port or ONU address in command templates.
pub const INTERFACE: &str = "{interface}";

/// Escalation from the unprivileged prompt.
#[derive(Debug, Clone)]
pub struct EnableLevel {
    /// Command that escalates (e.g. `enable`).
    pub command: String,

    /// Prompt shown before escalation (e.g. `ZXAN>`).
    pub unprivileged_prompt: Regex,

    /// Password prompt some firmware shows after the command.
    pub password_prompt: Option<Regex>,
}

impl EnableLevel {
    pub fn new(command: impl Into<String>, unprivileged_prompt: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            command: command.into(),
            unprivileged_prompt: compile_prompt_pattern(unprivileged_prompt)?,
            password_prompt: None,
        })
    }

    /// Expect an optional password prompt after the enable command.
    pub fn with_auth(mut self, prompt_pattern: &str) -> Result<Self, regex::Error> {
        self.password_prompt = Some(compile_prompt_pattern(prompt_pattern)?);
        Ok(self)
    }
}

/// Inventory commands, with [`INTERFACE`] where an address goes.
#[derive(Debug, Clone)]
pub struct CommandSet {
    pub cards: String,
    pub onu_states: String,
    pub onu_detail: Option<String>,
    pub unconfigured: Option<String>,
}

/// Everything vendor-specific about talking to one OLT family.
#[derive(Debug, Clone)]
pub struct Dialect {
    /// Vendor name as it appears in device descriptors.
    pub name: String,

    pub login_prompt: Regex,
    pub password_prompt: Regex,

    /// Any shell prompt, privileged or not.
    pub shell_prompt: Regex,

    pub enable: Option<EnableLevel>,

    /// Pager prompt answered with a space.
    pub pager: Option<Regex>,

    /// Text the device prints when a login is rejected.
    pub auth_failure_markers: Vec<String>,

    /// Text that marks a command as rejected.
    pub failed_when_contains: Vec<String>,

    /// Text that marks a listing as legitimately empty.
    pub empty_when_contains: Vec<String>,

    /// Commands to run once authenticated (pagination off).
    pub on_open_commands: Vec<String>,

    /// Commands to run before the socket is closed.
    pub on_close_commands: Vec<String>,

    pub line_terminator: String,

    pub commands: CommandSet,

    /// Port address template using `{slot}` and `{port}`.
    pub port_template: String,

    /// ONU address template using `{slot}`, `{port}` and `{onu}`.
    pub onu_template: String,

    /// Highest PON slot the templates can address. `None` when the
    /// templates carry `{slot}`.
    pub max_slots: Option<u8>,

    pub oid_map: Option<OidMap>,
}

impl Dialect {
    /// Create a dialect with the usual `Username:`/`Password:` login prompts.
    pub fn new(name: impl Into<String>, shell_prompt: &str, commands: CommandSet) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            login_prompt: compile_prompt_pattern(r"(?i)(user\s?name|login)\s*:")?,
            password_prompt: compile_prompt_pattern(r"(?i)password\s*:")?,
            shell_prompt: compile_prompt_pattern(shell_prompt)?,
            enable: None,
            pager: None,
            auth_failure_markers: vec![],
            failed_when_contains: vec![],
            empty_when_contains: vec![],
            on_open_commands: vec![],
            on_close_commands: vec![],
            line_terminator: "\r\n".to_string(),
            commands,
            port_template: "{slot}/{port}".to_string(),
            onu_template: "{slot}/{port}:{onu}".to_string(),
            max_slots: None,
            oid_map: None,
        })
    }

    pub fn with_login_prompt(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.login_prompt = compile_prompt_pattern(pattern)?;
        Ok(self)
    }

    pub fn with_password_prompt(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.password_prompt = compile_prompt_pattern(pattern)?;
        Ok(self)
    }

    pub fn with_pager(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.pager = Some(compile_prompt_pattern(pattern)?);
        Ok(self)
    }

    pub fn with_enable(mut self, enable: EnableLevel) -> Self {
        self.enable = Some(enable);
        self
    }

    pub fn with_auth_failure_marker(mut self, marker: impl Into<String>) -> Self {
        self.auth_failure_markers.push(marker.into());
        self
    }

    /// Add a failure pattern.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    pub fn with_empty_marker(mut self, marker: impl Into<String>) -> Self {
        self.empty_when_contains.push(marker.into());
        self
    }

    /// Add an on_open command.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// Add an on_close command.
    pub fn with_on_close_command(mut self, command: impl Into<String>) -> Self {
        self.on_close_commands.push(command.into());
        self
    }

    pub fn with_address_templates(mut self, port: impl Into<String>, onu: impl Into<String>) -> Self {
        self.port_template = port.into();
        self.onu_template = onu.into();
        self
    }

    /// Limit devices of this dialect to `slots` PON slots.
    pub fn with_max_slots(mut self, slots: u8) -> Self {
        self.max_slots = Some(slots);
        self
    }

    pub fn with_oid_map(mut self, map: OidMap) -> Self {
        self.oid_map = Some(map);
        self
    }

    /// Render a port address, e.g. `gpon-olt_1/1/3`.
    pub fn port_interface(&self, address: PonPortAddress) -> String {
        self.port_template
            .replace("{slot}", &address.slot.to_string())
            .replace("{port}", &address.port.to_string())
    }

    /// Render an ONU address, e.g. `gpon-onu_1/1/3:7`.
    pub fn onu_interface(&self, address: PonPortAddress, onu_id: u16) -> String {
        self.onu_template
            .replace("{slot}", &address.slot.to_string())
            .replace("{port}", &address.port.to_string())
            .replace("{onu}", &onu_id.to_string())
    }

    pub fn cards_command(&self) -> &str {
        &self.commands.cards
    }

    pub fn onu_states_command(&self, address: PonPortAddress) -> String {
        self.commands
            .onu_states
            .replace(INTERFACE, &self.port_interface(address))
    }

    pub fn onu_detail_command(&self, address: PonPortAddress, onu_id: u16) -> Option<String> {
        self.commands
            .onu_detail
            .as_ref()
            .map(|template| template.replace(INTERFACE, &self.onu_interface(address, onu_id)))
    }

    pub fn unconfigured_command(&self) -> Option<&str> {
        self.commands.unconfigured.as_deref()
    }

    /// The first failure marker present in `output`.
    pub fn detect_failure(&self, output: &str) -> Option<String> {
        self.failed_when_contains
            .iter()
            .find(|marker| output.contains(marker.as_str()))
            .cloned()
    }

    /// Whether `output` is the device's way of saying "nothing here".
    pub fn is_empty_response(&self, output: &str) -> bool {
        output.trim().is_empty()
            || self
                .empty_when_contains
                .iter()
                .any(|marker| output.contains(marker.as_str()))
    }
}
