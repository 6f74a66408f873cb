mod config;

use db::{Database, NoTls};
use http_body_util::Full;
use hyper::{
    body::{Bytes, Incoming},
    server::conn::http1,
    service::service_fn,
    Request, Response,
};
use hyper_util::rt::TokioIo;
use std::{
    convert::Infallible,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};
use tokio::{net::TcpListener, runtime::Runtime};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = config::Config::from_env()?;

    let runtime = Runtime::new()?;
    let (client, conn) = runtime.block_on(config.postgres().connect(NoTls))?;
    let driver = runtime.spawn(async move {
        if let Err(err) = conn.await {
            log::error!("database connection closed: {err}");
        }
    });

    let db = Database::from(client);
    runtime.block_on(db.migrate()).map_err(|err| anyhow::anyhow!("cannot install schema: {err}"))?;
    let db = Arc::new(db);

    let addr: SocketAddr = (Ipv4Addr::UNSPECIFIED, config.port).into();
    let listener = runtime.block_on(TcpListener::bind(addr))?;
    log::info!("listening on {addr}");

    runtime.block_on(async move {
        let mut shutdown = core::pin::pin!(tokio::signal::ctrl_c());
        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => accepted?,
                signal = &mut shutdown => {
                    signal?;
                    log::info!("shutting down");
                    break;
                }
            };

            let db = db.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let db = db.clone();
                    async move {
                        let method = req.method().clone();
                        let path = req.uri().path().to_owned();
                        let now = chrono::Utc::now();
                        let res = api::try_respond(req, db.as_ref(), now).await.unwrap_or_else(|status| {
                            let mut res = Response::new(Full::<Bytes>::default());
                            *res.status_mut() = status;
                            res
                        });
                        log::info!("{peer} {method} {path} {}", res.status());
                        Ok::<_, Infallible>(res)
                    }
                });
                if let Err(err) = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await {
                    log::warn!("connection with {peer} failed: {err}");
                }
            });
        }
        anyhow::Ok(())
    })?;

    driver.abort();
    Ok(())
}
