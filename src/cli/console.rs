use std::str::FromStr;

pub const CONSOLE_HELP: &str = "\
Commands:
  send <origin> <destination> <amount>   submit a transaction
  mine                                    mine a block in the background
  stop                                    cancel the running search
  chain                                   list the local chain
  sync                                    ask peers for their chains
  balance [address]                       balance of this node or an address
  peers                                   list known peers
  log                                     show recent events
  help                                    show this help
  quit                                    shut the node down";

/// One line typed at the operator console
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Send {
        origin: String,
        destination: String,
        amount: f64,
    },
    Mine,
    Stop,
    Chain,
    Sync,
    Balance(Option<String>),
    Peers,
    Log,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let Some(command) = words.next() else {
            return Err("Empty command. Type 'help' for the list".to_string());
        };
        let args: Vec<&str> = words.collect();

        let parsed = match (command.to_lowercase().as_str(), args.as_slice()) {
            ("send", [origin, destination, amount]) => {
                let amount = amount
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid amount: {amount}"))?;
                ConsoleCommand::Send {
                    origin: origin.to_string(),
                    destination: destination.to_string(),
                    amount,
                }
            }
            ("send", _) => return Err("Usage: send <origin> <destination> <amount>".to_string()),
            ("mine", []) => ConsoleCommand::Mine,
            ("stop", []) => ConsoleCommand::Stop,
            ("chain", []) => ConsoleCommand::Chain,
            ("sync", []) => ConsoleCommand::Sync,
            ("balance", []) => ConsoleCommand::Balance(None),
            ("balance", [address]) => ConsoleCommand::Balance(Some(address.to_string())),
            ("peers", []) => ConsoleCommand::Peers,
            ("log", []) => ConsoleCommand::Log,
            ("help", _) => ConsoleCommand::Help,
            ("quit" | "exit", []) => ConsoleCommand::Quit,
            (other, _) => {
                return Err(format!(
                    "Invalid command: {other}. Type 'help' for the list"
                ))
            }
        };
        Ok(parsed)
    }
}
