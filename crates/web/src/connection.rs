//! Per-socket connection driver.
//!
//! One task per socket; increments are processed strictly in order, so the
//! connection context needs no locking. The driver reads, feeds the
//! scanner or the body accumulator depending on the context's stage, and
//! dispatches once a request is body-complete. Backpressure is the read
//! loop itself: nothing is read from the socket while a pipeline runs.
//!
//! Rejections write their error template and tear the connection down.
//! Continuations keep reading. Residual bytes past a dispatched request
//! are replayed into the next cycle, preserving HTTP/1.1 pipelining
//! order.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use fastline_http::codec::body::{BodyAccumulator, BodyProgress, Selection, select_strategy};
use fastline_http::context::{ConnContext, ParseStage};
use fastline_http::flags::StatusFlag;
use fastline_http::scanner::{scan_more_headers, scan_request_head};

use crate::response::templates;
use crate::server::Server;

const READ_CHUNK: usize = 8 * 1024;

enum Increment {
    Data(BytesMut),
    Eof,
}

async fn read_increment(stream: &mut TcpStream, timeout: std::time::Duration) -> std::io::Result<Increment> {
    let mut chunk = BytesMut::with_capacity(READ_CHUNK);
    match tokio::time::timeout(timeout, stream.read_buf(&mut chunk)).await {
        Err(_elapsed) => Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "socket read timed out")),
        Ok(Err(e)) => Err(e),
        Ok(Ok(0)) => Ok(Increment::Eof),
        Ok(Ok(_)) => Ok(Increment::Data(chunk)),
    }
}

async fn write_bytes(stream: &mut TcpStream, bytes: &[u8]) -> bool {
    match stream.write_all(bytes).await {
        Ok(()) => true,
        Err(e) => {
            debug!(cause = %e, "response write failed");
            false
        }
    }
}

fn rejection_template(server: &Server, flag: StatusFlag) -> Bytes {
    match flag {
        StatusFlag::CorsPreflight => {
            server.cors.as_ref().map_or_else(|| templates::RESP_204.clone(), |cors| cors.preflight.clone())
        }
        StatusFlag::NotFound => {
            server.cors.as_ref().map_or_else(|| templates::RESP_404.clone(), |cors| cors.not_found.clone())
        }
        other => templates::for_flag(other).clone(),
    }
}

fn wants_close(ctx: &ConnContext) -> bool {
    ctx.headers.get("connection").is_some_and(|value| value.eq_ignore_ascii_case("close"))
}

/// Drives one connection to completion and hands the context back for
/// return to the pool. Partially accumulated state is simply discarded
/// with the context reset; it is never delivered to a handler.
pub(crate) async fn drive(server: &Server, mut stream: TcpStream, mut ctx: ConnContext) -> ConnContext {
    let timeout = server.config.timeout;

    'connection: loop {
        // ---- request head ----
        loop {
            if !ctx.buf.is_empty() {
                match ctx.stage {
                    ParseStage::AwaitingMoreHeaders => scan_more_headers(&mut ctx, &server.limits),
                    _ => {
                        scan_request_head(&server.router, &mut ctx, &server.limits, server.cors_enabled());
                    }
                }
                match ctx.flag {
                    StatusFlag::Ok => break,
                    StatusFlag::UnterminatedHeaders => {}
                    flag => {
                        trace!(?flag, "rejecting request head");
                        let template = rejection_template(server, flag);
                        write_bytes(&mut stream, &template).await;
                        break 'connection;
                    }
                }
            }
            match read_increment(&mut stream, timeout).await {
                Ok(Increment::Data(chunk)) => ctx.buf.extend_from_slice(&chunk),
                Ok(Increment::Eof) => break 'connection,
                Err(e) => {
                    trace!(cause = %e, "head read ended");
                    break 'connection;
                }
            }
        }

        let Some(pipe) = ctx.route.and_then(|index| server.pipes.get(index)) else {
            // Flag Ok guarantees a route; a miss here is a wiring bug.
            warn!(route = ?ctx.route, "no pipeline for matched route");
            break 'connection;
        };

        // Per-route header ceiling, checkable only once the route is known.
        if ctx.header_size > pipe.max_header_size {
            write_bytes(&mut stream, templates::for_flag(StatusFlag::MaxHeaderSize)).await;
            break 'connection;
        }

        if !pipe.content_expectation_met(&ctx.headers) {
            write_bytes(&mut stream, &templates::RESP_400).await;
            break 'connection;
        }

        let Some(method) = ctx.method else {
            break 'connection;
        };

        // Bytes that arrived behind the header boundary: the body's first
        // increment, or the next pipelined request for bodyless strategies.
        let already = ctx.buf.split_off(ctx.body_offset);
        let mut residual = BytesMut::new();
        let mut close_after = false;

        let body = match select_strategy(method, &ctx.headers, ctx.content_len, &pipe.body) {
            Selection::Dispatch(body) => {
                residual = already;
                body
            }
            Selection::Reject(flag) => {
                write_bytes(&mut stream, &rejection_template(server, flag)).await;
                break 'connection;
            }
            Selection::Accumulate(acc) => {
                ctx.stage = match &acc {
                    BodyAccumulator::Chunked(_) => ParseStage::AccumulatingChunked,
                    BodyAccumulator::UntilClose(_) => ParseStage::AccumulatingUntilClose,
                    _ => ParseStage::AccumulatingFixed,
                };
                ctx.body = acc;

                let mut complete: Option<Option<Bytes>> = None;
                match ctx.body.push(&already) {
                    Ok(BodyProgress::Done(done)) => complete = Some(done),
                    Ok(BodyProgress::Incomplete) => {}
                    Err(flag) => {
                        write_bytes(&mut stream, &rejection_template(server, flag)).await;
                        break 'connection;
                    }
                }

                while complete.is_none() {
                    match read_increment(&mut stream, timeout).await {
                        Ok(Increment::Data(chunk)) => match ctx.body.push(&chunk) {
                            Ok(BodyProgress::Done(done)) => complete = Some(done),
                            Ok(BodyProgress::Incomplete) => {}
                            Err(flag) => {
                                write_bytes(&mut stream, &rejection_template(server, flag)).await;
                                break 'connection;
                            }
                        },
                        Ok(Increment::Eof) => {
                            if ctx.stage == ParseStage::AccumulatingUntilClose {
                                complete = Some(ctx.body.finish());
                                close_after = true;
                            } else {
                                // Stream ended inside framed body: discard.
                                break 'connection;
                            }
                        }
                        Err(e) => {
                            trace!(cause = %e, "body read ended");
                            break 'connection;
                        }
                    }
                }

                residual = ctx.body.take_residual();
                ctx.body = BodyAccumulator::Done;
                complete.flatten()
            }
        };

        // ---- dispatch ----
        // Reads stay paused until the pipeline completes and the reply is
        // on the wire.
        let Some((resp_slot, mut resp)) = server.allocate_response() else {
            warn!("response pool exhausted");
            break 'connection;
        };
        let reply = pipe.dispatch(body, &ctx, resp.as_mut()).await;
        let wrote = write_bytes(&mut stream, &reply).await;
        server.release_response(resp_slot, resp);
        if !wrote {
            break 'connection;
        }

        if close_after || wants_close(&ctx) {
            break 'connection;
        }

        // ---- next pipelined request ----
        ctx.reset();
        if !residual.is_empty() {
            ctx.buf = residual;
        }
    }

    ctx
}
