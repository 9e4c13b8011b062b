use log::{error, info, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use tokio::net::TcpListener;

use ofwire::ofp_message::{OfpMessage, RawParser};
use ofwire::ofp_stream::MessageStream;

fn init_logging() {
    let stdout = ConsoleAppender::builder().build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))
        .unwrap();
    log4rs::init_config(config).unwrap();
}

/// Passive OpenFlow listener: accepts switch connections and logs every
/// message that arrives, leaving the protocol state machine to the caller
/// embedding the library.
#[tokio::main]
async fn main() {
    init_logging();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:6653".to_string());
    let listener = TcpListener::bind(&addr).await.unwrap();
    info!("OpenFlow message stream listener running on {addr}");

    loop {
        let socket = match listener.accept().await {
            Ok((socket, peer)) => {
                info!("switch connected from {peer}");
                socket
            }
            Err(err) => {
                error!("accept error: {err}");
                continue;
            }
        };

        tokio::spawn(async move {
            let mut stream = MessageStream::new(socket, RawParser);
            let peer = stream.remote_addr();
            loop {
                tokio::select! {
                    msg = stream.inbound.recv() => match msg {
                        Some(msg) => info!(
                            "inbound message from {peer:?}: version {}, type {}, xid {}, {} bytes",
                            msg.header.version(),
                            msg.header.typ(),
                            msg.header.xid(),
                            msg.size_of(),
                        ),
                        None => {
                            info!("stream from {peer:?} closed");
                            return;
                        }
                    },
                    err = stream.errors.recv() => {
                        if let Some(err) = err {
                            error!("stream error from {peer:?}: {err}");
                        }
                        return;
                    }
                }
            }
        });
    }
}
