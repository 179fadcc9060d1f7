//! Command documents sent to nodes.

use std::collections::BTreeMap;

/// Document installing or removing a provider-distributed package.
pub const CONFIGURE_PACKAGE: &str = "AWS-ConfigureAWSPackage";

/// Document running shell commands.
pub const RUN_SHELL_SCRIPT: &str = "AWS-RunShellScript";

/// Document managing the monitoring agent.
pub const MANAGE_AGENT: &str = "AmazonCloudWatch-ManageAgent";

/// Package name of the monitoring agent.
pub const AGENT_PACKAGE: &str = "AmazonCloudWatchAgent";

/// A named document plus its parameters.
///
/// Every parameter value is a list of strings on the wire, even when there is
/// only one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDocument {
    pub name: String,
    pub parameters: BTreeMap<String, Vec<String>>,
}

impl CommandDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Add a single-valued parameter.
    pub fn param(self, key: &str, value: impl Into<String>) -> Self {
        self.params(key, [value.into()])
    }

    /// Add a multi-valued parameter.
    pub fn params<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters
            .insert(key.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Install the latest monitoring agent package.
    pub fn install_agent() -> Self {
        Self::new(CONFIGURE_PACKAGE)
            .param("action", "Install")
            .param("name", AGENT_PACKAGE)
            .param("version", "latest")
    }

    /// Create the collectd types database the agent expects.
    pub fn init_collectd() -> Self {
        Self::new(RUN_SHELL_SCRIPT).params(
            "commands",
            [
                "mkdir -p /usr/share/collectd/",
                "touch /usr/share/collectd/types.db",
            ],
        )
    }

    /// Load agent configuration from a parameter and restart the agent.
    pub fn configure_agent(parameter_name: &str) -> Self {
        Self::new(MANAGE_AGENT)
            .param("action", "configure")
            .param("mode", "ec2")
            .param("optionalConfigurationSource", "ssm")
            .param("optionalConfigurationLocation", parameter_name)
            .param("optionalRestart", "yes")
    }
}
