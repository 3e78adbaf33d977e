//
//  Share a directory over WebDAV.
//
//  Listens on localhost:8080, plain http, no ssl.
//  Connect to http://localhost:8080/
//

use std::convert::Infallible;
use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use futures_util::future::TryFutureExt;

use dav_share::{body::Body, DavHandler, FileSystem};

#[derive(Debug, clap::Parser)]
#[command(about, version, disable_help_flag = true)]
struct Cli {
    /// address to listen on
    #[arg(short, long, default_value = "127.0.0.1")]
    host: IpAddr,
    /// port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,
    /// local directory to serve (default: current directory)
    #[arg(short, long)]
    dir: Option<PathBuf>,
    /// only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
    /// print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

async fn handle(
    dh: DavHandler,
    req: hyper::Request<hyper::Body>,
) -> Result<hyper::Response<Body>, Infallible> {
    log::info!("{} {}", req.method(), req.uri());
    Ok(dh.handle(req).await)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let Cli {
        host,
        port,
        dir,
        quiet,
        ..
    } = Cli::parse();

    let level = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let dir = match dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    if !dir.is_dir() {
        return Err(format!("{}: not a directory", dir.display()).into());
    }

    let dav_server = DavHandler::builder(FileSystem::local(dir.clone(), false)).build();
    let make_service = hyper::service::make_service_fn(|_| {
        let dav_server = dav_server.clone();
        async move {
            let func = move |req| handle(dav_server.clone(), req);
            Ok::<_, hyper::Error>(hyper::service::service_fn(func))
        }
    });

    let addr = SocketAddr::new(host, port);
    let server = hyper::Server::try_bind(&addr)?
        .serve(make_service)
        .map_err(|e| eprintln!("server error: {}", e));

    println!("Serving {} on http://{}/", dir.display(), addr);
    let _ = server.await;
    Ok(())
}
