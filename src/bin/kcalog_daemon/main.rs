use kcalog::error_handling::print_error_chain;
use kcalog::executor::Executor;
use kcalog::outbox::HttpOutbox;
use kcalog::registry::ReminderRegistry;
use kcalog::route_message;
use kcalog::scheduler::Reminder;
use kcalog::store::Store;
use kcalog::worker::{self, TaskSender};
use serde::Deserialize;
use std::io::{empty, Read};
use std::str::FromStr;
use std::sync::Arc;
use tiny_http::{Method, Request, Response, ResponseBox, Server};
use tracing::info;

/// The JSON body the chat platform POSTs for every inbound message
#[derive(Deserialize)]
struct InboundMessage {
    user_id: i64,
    text: String,
}

// Construct an empty HTTP response with a status code s
fn empty_result(status: u32) -> ResponseBox {
    Response::new(status.into(), vec![], Box::new(empty()), Some(0), None)
}

fn inbound_message_webhook(req: &mut Request, queue: &TaskSender) -> ResponseBox {
    let mut buf = String::new();

    if req.as_reader().read_to_string(&mut buf).is_err() {
        tracing::warn!("couldn't read request body.");
        return empty_result(400);
    }

    match serde_json::from_str::<InboundMessage>(&buf) {
        Ok(message) => {
            // Blocks while the task queue is full; the chat platform's
            // retries are what smooth over a stalled pool.
            if let Err(e) = route_message(message.user_id, &message.text, queue) {
                print_error_chain(&e);
                return empty_result(500);
            }
            empty_result(200)
        }
        Err(_) => {
            tracing::warn!("could not parse request body as json");
            empty_result(400)
        }
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let port = std::env::var("PORT").expect("missing PORT env var");
    let port = u16::from_str(port.as_ref()).expect("PORT should be a valid 16 bit integer");
    let send_url = std::env::var("KCALOG_SEND_URL").expect("missing KCALOG_SEND_URL env var");
    let users_dir = std::env::var("KCALOG_USERS_DIR").unwrap_or_else(|_| String::from("users"));
    let workers: usize = std::env::var("KCALOG_WORKERS")
        .ok()
        .and_then(|w| w.parse().ok())
        .unwrap_or(4);

    let store = Store::new(users_dir).expect("could not open the users dir");

    // Reminder subscriptions live in the record files; replay them so a
    // restart picks up where the process left off.
    let registry = Arc::new(
        ReminderRegistry::rebuild(&store).expect("could not rebuild the reminder registry"),
    );

    let outbox = Arc::new(HttpOutbox::new(&send_url));
    let executor = Arc::new(Executor::new(store, registry.clone(), outbox));

    let (queue_tx, queue_rx) = worker::task_queue();
    let _workers = worker::spawn(workers, queue_rx, executor);
    let _scheduler = Reminder::new(registry, queue_tx.clone()).spawn();

    let server = Server::http(("127.0.0.1", port)).expect("could not bind to PORT");

    info!("listening on port {}", port);

    for mut req in server.incoming_requests() {
        let res = if req.method() == &Method::Post && req.url() == "/message" {
            inbound_message_webhook(&mut req, &queue_tx)
        } else {
            empty_result(400)
        };

        info!("{} {} {}", req.method(), req.url(), res.status_code().0);
        req.respond(res).ok();
    }
}
