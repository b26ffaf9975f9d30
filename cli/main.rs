// netcat: relay lines between the terminal and a single TCP peer
use std::collections::VecDeque;
use std::io::{self, BufRead, Cursor};
use std::process;
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand};
use crossbeam::channel::{never, select, unbounded, Receiver, Sender};
use netcat::{NetCat, NetCatError, NetCatListener, OpKind, OpResult, State};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "netcat")]
#[command(about = "Relay lines between the terminal and a single TCP peer", long_about = None)]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Protocol tag
    #[arg(short, long, default_value = "TCP", global = true)]
    proto: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a remote host
    Connect {
        #[arg(value_name = "HOST")]
        host: String,
        #[arg(value_name = "PORT")]
        port: String,
    },

    /// Wait for one inbound connection
    Listen {
        #[arg(value_name = "PORT")]
        port: String,
    },
}

enum Event {
    Progress(State),
    Completed(OpResult),
    Failed(OpResult),
}

// Forwards notifications to the main loop
struct Forwarder(Sender<Event>);

impl NetCatListener for Forwarder {
    fn progress(&self, _op: OpKind, state: State) {
        let _ = self.0.send(Event::Progress(state));
    }

    fn completed(&self, result: OpResult) {
        let _ = self.0.send(Event::Completed(result));
    }

    fn failed(&self, result: OpResult) {
        let _ = self.0.send(Event::Failed(result));
    }
}

fn init_tracing() {
    // stdout carries relayed data, so logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("netcat=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn spawn_stdin_reader() -> io::Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("netcat-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

fn send_line(netcat: &NetCat, line: String) {
    let mut bytes = line.into_bytes();
    bytes.push(b'\n');
    netcat.set_input(Cursor::new(bytes));
    netcat.send();
}

fn run(cli: Cli) -> Result<(), NetCatError> {
    let netcat = NetCat::new()?;
    let (tx, events) = unbounded();
    netcat.set_listener(Arc::new(Forwarder(tx)));

    match &cli.command {
        Commands::Connect { host, port } => netcat.connect(&cli.proto, host, port),
        Commands::Listen { port } => netcat.listen(&cli.proto, port),
    };

    let stdin = spawn_stdin_reader()?;
    let closed = never();
    let mut stdin_open = true;
    let mut pending = VecDeque::new();
    let mut connected = false;

    loop {
        let lines = if stdin_open { &stdin } else { &closed };
        select! {
            recv(events) -> event => {
                let Ok(event) = event else { return Ok(()) };
                match event {
                    Event::Progress(State::Listening) => {
                        if let Some(addr) = netcat.local_addr() {
                            info!("Listening on {}", addr);
                        }
                    }
                    Event::Progress(State::Connected) => {
                        if let Some(addr) = netcat.peer_addr() {
                            info!("Connected to {}", addr);
                        }
                    }
                    Event::Progress(State::Idle) => info!("Connection is closed"),
                    Event::Completed(result) => match result.op {
                        OpKind::Connect | OpKind::Listen => {
                            connected = true;
                            netcat.set_output(io::stdout());
                            netcat.receive();
                            while let Some(line) = pending.pop_front() {
                                send_line(&netcat, line);
                            }
                            if !stdin_open {
                                netcat.disconnect();
                            }
                        }
                        OpKind::Receive => return Ok(()),
                        OpKind::Send | OpKind::Disconnect => {}
                    },
                    Event::Failed(mut result) => {
                        let err = result.error.take().unwrap_or(NetCatError::SessionClosed);
                        match result.op {
                            OpKind::Send => error!("Send failed: {}", err),
                            _ => return Err(err),
                        }
                    }
                }
            }
            recv(lines) -> line => match line {
                Ok(line) if connected => send_line(&netcat, line),
                Ok(line) => pending.push_back(line),
                Err(_) => {
                    // End of input: hang up once everything queued is sent
                    stdin_open = false;
                    if connected {
                        netcat.disconnect();
                    }
                }
            },
        }
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("netcat: {}", e);
        process::exit(1);
    }
}
