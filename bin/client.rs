use anyhow::Context;
use clap::{CommandFactory, Parser};
use linechat::{
    arguments::{port_or_default, ClientArguments},
    endpoint::{parse_ipv4, Endpoint},
    init_tracing, prompt_port,
};
use tokio::io::{stdin, stdout, BufReader};

fn main() -> anyhow::Result<()> {
    let args = ClientArguments::parse();
    let Some(server_ip) = args.server_ip.clone() else {
        anyhow::bail!(
            "Missing server address\n\n{}",
            ClientArguments::command().render_usage()
        );
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    let result = runtime.block_on(chat(server_ip, args));
    // stdin may still be blocked in a read nobody waits for anymore.
    runtime.shutdown_background();
    result
}

async fn chat(server_ip: String, args: ClientArguments) -> anyhow::Result<()> {
    init_tracing(args.session.console)?;

    // One buffered reader for both the port prompt and the chat, so no typed-ahead line is lost.
    let mut input = BufReader::new(stdin());
    let port = match args.port.as_deref() {
        Some(port) => port_or_default(Some(port)),
        None => prompt_port(&mut input, &mut stdout()).await?,
    };

    let ip = parse_ipv4(&server_ip)?;
    let endpoint = Endpoint::connect(ip, port).await?;
    println!("Connected to {server_ip}:{port}");

    endpoint
        .run(input, stdout(), args.session.session_config())
        .await;
    Ok(())
}
