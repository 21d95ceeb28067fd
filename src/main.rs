// Entry point: parse the command line, start a node and hand stdin to the
// operator console, or query a remote node and exit.
use clap::Parser;
use courier_chain::cli::{ConsoleCommand, StartArgs, CONSOLE_HELP};
use courier_chain::network::{exchange, Envelope, Message};
use courier_chain::{Command, Config, Node, Opt, Result};
use log::{error, LevelFilter};
use std::io::{self, BufRead, Write};
use std::process;
use std::sync::Arc;

fn main() {
    // RUST_LOG still overrides the default filter
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();
    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<()> {
    match command {
        Command::Start(args) => start_node(&args),
        Command::Ping { addr } => {
            let config = remote_config()?;
            match query(&config, &addr, Message::Ping)? {
                Some(Message::Pong) => println!("{addr} is alive"),
                other => println!("{addr} answered unexpectedly: {other:?}"),
            }
            Ok(())
        }
        Command::Chain { addr } => {
            let config = remote_config()?;
            match query(&config, &addr, Message::RequestChain)? {
                Some(Message::ResponseChain(chain)) => {
                    for block in &chain {
                        println!(
                            "#{} {} ({} transactions)",
                            block.get_index(),
                            block.get_hash(),
                            block.get_transactions().len()
                        );
                    }
                }
                other => println!("{addr} answered unexpectedly: {other:?}"),
            }
            Ok(())
        }
    }
}

fn remote_config() -> Result<Config> {
    let config = Config::load(None)?;
    config.validate()?;
    Ok(config)
}

fn query(config: &Config, addr: &str, message: Message) -> Result<Option<Message>> {
    let reply = exchange(
        addr,
        &Envelope::new("", message),
        config.connect_timeout(),
        config.read_timeout(),
    )?;
    Ok(reply.map(|envelope| envelope.message))
}

fn start_node(args: &StartArgs) -> Result<()> {
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let node = Node::start(config)?;
    println!("Node {} is up. Type 'help' for commands.", node.address());

    let stdin = io::stdin();
    prompt()?;
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            prompt()?;
            continue;
        }
        match line.parse::<ConsoleCommand>() {
            Ok(ConsoleCommand::Quit) => break,
            Ok(command) => run_console_command(&node, command),
            Err(e) => println!("{e}"),
        }
        prompt()?;
    }

    node.shutdown();
    Ok(())
}

fn prompt() -> Result<()> {
    print!("> ");
    io::stdout().flush()?;
    Ok(())
}

fn run_console_command(node: &Arc<Node>, command: ConsoleCommand) {
    match command {
        ConsoleCommand::Send {
            origin,
            destination,
            amount,
        } => match node.submit_transaction(&origin, &destination, amount) {
            Ok(true) => println!("Transaction admitted and broadcast"),
            Ok(false) => println!("Transaction rejected (duplicate or insufficient balance)"),
            Err(e) => println!("{e}"),
        },
        ConsoleCommand::Mine => {
            if node.start_mining() {
                println!("Mining started");
            } else {
                println!("Already mining");
            }
        }
        ConsoleCommand::Stop => {
            if node.stop_mining() {
                println!("Stopping miner");
            } else {
                println!("Not mining");
            }
        }
        ConsoleCommand::Chain => {
            let chain = node.list_chain();
            println!("Chain has {} blocks", chain.len());
            for block in &chain {
                println!(
                    "#{} {} ({} transactions)",
                    block.get_index(),
                    block.get_hash(),
                    block.get_transactions().len()
                );
            }
        }
        ConsoleCommand::Sync => node.request_sync(),
        ConsoleCommand::Balance(None) => {
            println!("Balance of {}: {}", node.address(), node.balance())
        }
        ConsoleCommand::Balance(Some(address)) => {
            println!("Balance of {address}: {}", node.balance_of(&address))
        }
        ConsoleCommand::Peers => {
            for peer in node.peers() {
                println!("{peer}");
            }
        }
        ConsoleCommand::Log => {
            for line in node.recent_events() {
                println!("{line}");
            }
        }
        ConsoleCommand::Help => println!("{CONSOLE_HELP}"),
        ConsoleCommand::Quit => {}
    }
}
