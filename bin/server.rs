use anyhow::Context;
use clap::{CommandFactory, Parser};
use linechat::{
    arguments::{port_or_default, ServerArguments},
    endpoint::{parse_ipv4, Listener},
    init_tracing,
};
use tokio::io::{stdin, stdout, BufReader};

fn main() -> anyhow::Result<()> {
    let args = ServerArguments::parse();
    let Some(bind_ip) = args.bind_ip.clone() else {
        ServerArguments::command()
            .print_help()
            .context("Failed to print usage")?;
        return Ok(());
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    let result = runtime.block_on(serve(bind_ip, args));
    // stdin may still be blocked in a read nobody waits for anymore.
    runtime.shutdown_background();
    result
}

async fn serve(bind_ip: String, args: ServerArguments) -> anyhow::Result<()> {
    init_tracing(args.session.console)?;

    let port = port_or_default(args.port.as_deref());
    let ip = parse_ipv4(&bind_ip).context("Invalid bind IP")?;
    let listener = Listener::bind(ip, port)?;
    let bound = listener
        .local_addr()
        .context("Failed to read bound address")?;
    println!("Server listening on port {}...", bound.port());

    let endpoint = listener.accept().await?;
    let peer = endpoint.peer_addr();
    println!("Connection from {}:{}", peer.ip(), peer.port());

    endpoint
        .run(
            BufReader::new(stdin()),
            stdout(),
            args.session.session_config(),
        )
        .await;
    Ok(())
}
