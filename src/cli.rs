use clap::Parser;

/// Interactive client for a PubSubX publish/subscribe broker.
///
/// Session commands (CONNECT, SUBSCRIBE, PUBLISH, ...) are read from stdin;
/// enter -h at the prompt for the command reference.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Host the broker runs on; the CONNECT command supplies the port.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
}
