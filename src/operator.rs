use crate::config::ServerSettings;
use crate::credentials::UnsealKey;
use crate::runner::{CommandArg, CommandSpec};

const VAULT_BIN: &str = "vault";

/// Where `vault operator` commands run and which server they address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorTarget {
    pub image: String,
    pub network: String,
    /// Server address as seen from inside `network`.
    pub address: String,
}

impl OperatorTarget {
    #[must_use]
    pub fn from_settings(server: &ServerSettings) -> Self {
        Self {
            image: server.image.clone(),
            network: server.network.clone(),
            address: server.operator_address(),
        }
    }

    #[must_use]
    pub fn init_command(&self, key_shares: u8, key_threshold: u8) -> CommandSpec {
        self.operator_command(
            "init",
            vec![
                CommandArg::Plain(format!("-key-shares={key_shares}")),
                CommandArg::Plain(format!("-key-threshold={key_threshold}")),
            ],
        )
    }

    #[must_use]
    pub fn unseal_command(&self, key: &UnsealKey) -> CommandSpec {
        self.operator_command(
            "unseal",
            vec![CommandArg::Secret(key.expose_secret().to_string())],
        )
    }

    /// Commands a fresh bootstrap would issue, with placeholder shares.
    #[must_use]
    pub fn plan(&self, key_shares: u8, key_threshold: u8) -> Vec<CommandSpec> {
        let mut commands = vec![self.init_command(key_shares, key_threshold)];
        commands.extend(
            (0..key_threshold)
                .map(|index| self.unseal_command(&UnsealKey::new(format!("<share {index}>")))),
        );
        commands
    }

    fn operator_command(&self, subcommand: &str, extra: Vec<CommandArg>) -> CommandSpec {
        let mut args = vec![
            CommandArg::Plain(VAULT_BIN.to_string()),
            CommandArg::Plain("operator".to_string()),
            CommandArg::Plain(subcommand.to_string()),
            CommandArg::Plain(format!("-address={}", self.address)),
        ];
        args.extend(extra);
        CommandSpec {
            image: self.image.clone(),
            network: self.network.clone(),
            args,
        }
    }
}
