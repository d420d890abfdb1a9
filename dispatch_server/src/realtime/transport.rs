use std::{net::SocketAddr, sync::Arc};

use dispatch_engine::fanout::GroupKey;
use futures_util::{SinkExt, StreamExt};
use log::*;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::{header::AUTHORIZATION, StatusCode},
        Message,
    },
};

use crate::{
    auth::{bearer_token, JwtClaims},
    errors::ServerError,
    realtime::{handle_frame, LiveContext, Session},
};

/// Accepts real-time connections until the listener fails. Each connection runs on its own task.
pub async fn run_realtime_server(ctx: Arc<LiveContext>, host: &str, port: u16) -> Result<(), ServerError> {
    let listener = TcpListener::bind((host, port)).await?;
    info!("📡️ Real-time channel listening on {host}:{port}");
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!("📡️ New connection from {peer}");
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(ctx, stream, peer).await {
                        warn!("📡️ Connection from {peer} ended with an error. {e}");
                    }
                });
            },
            Err(e) => error!("📡️ Failed to accept a connection. {e}"),
        }
    }
}

async fn handle_connection(
    ctx: Arc<LiveContext>,
    stream: TcpStream,
    peer: SocketAddr,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let mut claims: Option<JwtClaims> = None;
    let authenticate = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let token = request_token(req).ok_or_else(|| unauthorized("No access token was provided"))?;
        match ctx.verifier.verify(&token) {
            Ok(c) => {
                claims = Some(c);
                Ok(resp)
            },
            Err(e) => {
                info!("📡️ Refused a connection from {peer}. {e}");
                Err(unauthorized(&e.to_string()))
            },
        }
    };
    let ws_stream = accept_hdr_async(stream, authenticate).await?;
    let Some(claims) = claims else {
        return Ok(());
    };

    let (id, mut outbound) = ctx.hub.register();
    if let Some(vendor_id) = claims.vendor_id() {
        ctx.hub.join(id, GroupKey::Vendor(vendor_id));
    }
    info!("📡️ {} ({}) connected from {peer} as connection {id}", claims.sub, claims.role);
    let session = Session::new(id, claims);
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let result = loop {
        tokio::select! {
            frame = ws_receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let reply = handle_frame(&ctx, &session, &text).await;
                    if let Err(e) = ws_sender.send(Message::Text(reply.to_json())).await {
                        break Err(e);
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    debug!("📡️ Connection {id} closed by the client");
                    break Ok(());
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => break Err(e),
            },
            Some(msg) = outbound.recv() => {
                trace!("📡️ Pushing {msg:?} to connection {id}");
                if let Err(e) = ws_sender.send(Message::Text(msg.to_json())).await {
                    break Err(e);
                }
            },
        }
    };
    ctx.hub.disconnect(id);
    info!("📡️ Connection {id} for {} has gone away", session.claims.sub);
    result
}

/// The token comes from an `Authorization: Bearer` header, or from a `token` query parameter for clients that cannot
/// set headers on the upgrade request.
fn request_token(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(String::from);
    from_header.or_else(|| {
        req.uri()
            .query()?
            .split('&')
            .find_map(|pair| pair.strip_prefix("token="))
            .filter(|t| !t.is_empty())
            .map(String::from)
    })
}

fn unauthorized(reason: &str) -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some(reason.to_string()));
    *resp.status_mut() = StatusCode::UNAUTHORIZED;
    resp
}
