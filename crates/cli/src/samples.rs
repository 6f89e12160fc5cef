//! Built-in programs under test.

use serde_json::json;

use skein_race::MemoryLocation;
use skein_runtime::{
    Actor, ActorId, Context, Event, Monitor, ReceiveFilter, Runtime, RuntimeError, SendOptions,
};

pub type SampleEntry = fn(&mut Runtime) -> Result<(), RuntimeError>;

pub struct Sample {
    pub name: &'static str,
    pub summary: &'static str,
    pub entry: SampleEntry,
}

pub const SAMPLES: &[Sample] = &[
    Sample {
        name: "ping-pong",
        summary: "two actors exchange three rounds of Ping/Pong through receive, then halt",
        entry: ping_pong,
    },
    Sample {
        name: "producer-consumer",
        summary: "two producers stream numbered items to one consumer that checks per-sender order",
        entry: producer_consumer,
    },
    Sample {
        name: "racy-counter",
        summary: "two incrementers update a shared counter without synchronization (use --race)",
        entry: racy_counter,
    },
    Sample {
        name: "lost-ack",
        summary: "a client's timeout can fire before the server's ack arrives (safety bug)",
        entry: lost_ack,
    },
    Sample {
        name: "unanswered-request",
        summary: "a server may silently drop a request a monitor is waiting on (liveness bug)",
        entry: unanswered_request,
    },
];

pub fn find(name: &str) -> Result<&'static Sample, RuntimeError> {
    SAMPLES.iter().find(|s| s.name == name).ok_or_else(|| {
        let known: Vec<&str> = SAMPLES.iter().map(|s| s.name).collect();
        RuntimeError::Config(format!(
            "unknown sample '{name}' (expected one of: {})",
            known.join(", ")
        ))
    })
}

// ping-pong

const ROUNDS: u32 = 3;

struct Pinger {
    ponger: Option<ActorId>,
    rounds: u32,
}

impl Pinger {
    fn ping(&self, cx: &mut Context<'_>) -> Result<(), RuntimeError> {
        if let Some(ponger) = &self.ponger {
            cx.send(ponger, Event::new("Ping"))?;
        }
        cx.receive(ReceiveFilter::of(&["Pong"]));
        Ok(())
    }
}

impl Actor for Pinger {
    fn on_start(&mut self, cx: &mut Context<'_>) -> Result<(), RuntimeError> {
        let me = cx.id().clone();
        self.ponger = Some(cx.create_actor("Ponger", Ponger { pinger: me }));
        self.ping(cx)
    }

    fn on_event(&mut self, cx: &mut Context<'_>, event: &Event) -> Result<(), RuntimeError> {
        Err(RuntimeError::unhandled(cx.id(), event))
    }

    fn on_receive(&mut self, cx: &mut Context<'_>, _event: &Event) -> Result<(), RuntimeError> {
        self.rounds += 1;
        if self.rounds < ROUNDS {
            return self.ping(cx);
        }
        if let Some(ponger) = &self.ponger {
            cx.send(ponger, Event::halt())?;
        }
        cx.halt();
        Ok(())
    }

    fn state_name(&self) -> Option<String> {
        Some(format!("Round{}", self.rounds))
    }
}

struct Ponger {
    pinger: ActorId,
}

impl Actor for Ponger {
    fn on_event(&mut self, cx: &mut Context<'_>, event: &Event) -> Result<(), RuntimeError> {
        cx.assert(event.name() == "Ping", format!("ponger got '{}'", event.name()))?;
        cx.send(&self.pinger, Event::new("Pong"))
    }
}

fn ping_pong(rt: &mut Runtime) -> Result<(), RuntimeError> {
    rt.create_actor(
        "Pinger",
        Pinger {
            ponger: None,
            rounds: 0,
        },
    );
    Ok(())
}

// producer-consumer

const ITEMS: u64 = 3;

struct Producer {
    consumer: ActorId,
}

impl Actor for Producer {
    fn on_start(&mut self, cx: &mut Context<'_>) -> Result<(), RuntimeError> {
        let me = cx.id().value();
        for seq in 0..ITEMS {
            let item = Event::with_payload("Item", json!({ "producer": me, "seq": seq }));
            cx.send(&self.consumer, item)?;
        }
        let done = SendOptions {
            must_handle: true,
            ..SendOptions::default()
        };
        cx.send_with(&self.consumer, Event::with_payload("Done", json!(me)), done)
    }

    fn on_event(&mut self, cx: &mut Context<'_>, event: &Event) -> Result<(), RuntimeError> {
        Err(RuntimeError::unhandled(cx.id(), event))
    }
}

#[derive(Default)]
struct Consumer {
    next: Vec<(u64, u64)>,
    done: usize,
}

impl Consumer {
    fn expected(&mut self, producer: u64) -> &mut u64 {
        let idx = match self.next.iter().position(|(p, _)| *p == producer) {
            Some(idx) => idx,
            None => {
                self.next.push((producer, 0));
                self.next.len() - 1
            }
        };
        &mut self.next[idx].1
    }
}

impl Actor for Consumer {
    fn on_event(&mut self, cx: &mut Context<'_>, event: &Event) -> Result<(), RuntimeError> {
        match event.name() {
            "Item" => {
                let payload = event.payload();
                let producer = payload["producer"].as_u64().unwrap_or_default();
                let seq = payload["seq"].as_u64().unwrap_or_default();
                let expected = self.expected(producer);
                let want = *expected;
                *expected += 1;
                cx.assert(
                    seq == want,
                    format!("item {seq} from producer {producer} arrived, expected {want}"),
                )
            }
            "Done" => {
                let producer = event.payload().as_u64().unwrap_or_default();
                let received = *self.expected(producer);
                cx.assert(
                    received == ITEMS,
                    format!("producer {producer} finished after {received} items"),
                )?;
                self.done += 1;
                if self.done == 2 {
                    cx.halt();
                }
                Ok(())
            }
            _ => Err(RuntimeError::unhandled(cx.id(), event)),
        }
    }

    fn hashed_state(&self) -> i64 {
        self.next.iter().map(|(_, n)| *n as i64).sum::<i64>() * 10 + self.done as i64
    }
}

fn producer_consumer(rt: &mut Runtime) -> Result<(), RuntimeError> {
    let consumer = rt.create_actor("Consumer", Consumer::default());
    for _ in 0..2 {
        rt.create_actor(
            "Producer",
            Producer {
                consumer: consumer.clone(),
            },
        );
    }
    Ok(())
}

// racy-counter

struct Incrementer;

impl Actor for Incrementer {
    fn on_start(&mut self, cx: &mut Context<'_>) -> Result<(), RuntimeError> {
        let counter = MemoryLocation::new("counter", 0);
        cx.read(&counter, "Incrementer::on_start load");
        cx.write(&counter, "Incrementer::on_start store");
        Ok(())
    }

    fn on_event(&mut self, cx: &mut Context<'_>, event: &Event) -> Result<(), RuntimeError> {
        Err(RuntimeError::unhandled(cx.id(), event))
    }
}

fn racy_counter(rt: &mut Runtime) -> Result<(), RuntimeError> {
    rt.create_actor("Incrementer", Incrementer);
    rt.create_actor("Incrementer", Incrementer);
    Ok(())
}

// lost-ack

struct Client {
    acked: bool,
}

impl Actor for Client {
    fn on_start(&mut self, cx: &mut Context<'_>) -> Result<(), RuntimeError> {
        let me = cx.id().clone();
        let server = cx.create_actor("Server", Server { client: me.clone() });
        let timer = cx.create_actor("Timer", Timer { client: me });
        cx.send(&server, Event::new("Request"))?;
        cx.send(&timer, Event::new("StartTimer"))
    }

    fn on_event(&mut self, cx: &mut Context<'_>, event: &Event) -> Result<(), RuntimeError> {
        match event.name() {
            "Ack" => {
                self.acked = true;
                Ok(())
            }
            "Timeout" => cx.assert(self.acked, "timeout fired before the ack arrived"),
            _ => Err(RuntimeError::unhandled(cx.id(), event)),
        }
    }

    fn state_name(&self) -> Option<String> {
        Some(if self.acked { "Acked" } else { "Pending" }.to_string())
    }
}

struct Server {
    client: ActorId,
}

impl Actor for Server {
    fn on_event(&mut self, cx: &mut Context<'_>, _event: &Event) -> Result<(), RuntimeError> {
        cx.invoke_action("process request");
        cx.send(&self.client, Event::new("Ack"))
    }
}

struct Timer {
    client: ActorId,
}

impl Actor for Timer {
    fn on_event(&mut self, cx: &mut Context<'_>, _event: &Event) -> Result<(), RuntimeError> {
        cx.send(&self.client, Event::new("Timeout"))
    }
}

fn lost_ack(rt: &mut Runtime) -> Result<(), RuntimeError> {
    rt.create_actor("Client", Client { acked: false });
    Ok(())
}

// unanswered-request

#[derive(Default)]
struct Responsiveness {
    pending: u32,
}

impl Monitor for Responsiveness {
    fn name(&self) -> &str {
        "Responsiveness"
    }

    fn on_event(&mut self, event: &Event) -> Result<(), RuntimeError> {
        match event.name() {
            "Requested" => self.pending += 1,
            "Responded" => self.pending = self.pending.saturating_sub(1),
            other => {
                return Err(RuntimeError::AssertionFailed(format!(
                    "Responsiveness cannot handle '{other}'"
                )))
            }
        }
        Ok(())
    }

    fn is_hot(&self) -> bool {
        self.pending > 0
    }

    fn state_name(&self) -> Option<String> {
        Some(if self.pending > 0 { "Waiting" } else { "Idle" }.to_string())
    }
}

struct Requester {
    server: ActorId,
}

impl Actor for Requester {
    fn on_start(&mut self, cx: &mut Context<'_>) -> Result<(), RuntimeError> {
        for _ in 0..2 {
            cx.monitor(Event::new("Requested"))?;
            cx.send(&self.server, Event::new("Request"))?;
        }
        Ok(())
    }

    fn on_event(&mut self, cx: &mut Context<'_>, _event: &Event) -> Result<(), RuntimeError> {
        cx.monitor(Event::new("Responded"))
    }
}

struct FlakyServer {
    requester: Option<ActorId>,
}

impl Actor for FlakyServer {
    fn on_event(&mut self, cx: &mut Context<'_>, event: &Event) -> Result<(), RuntimeError> {
        match event.name() {
            "Hello" => {
                let requester: ActorId = serde_json::from_value(event.payload().clone())
                    .map_err(|e| RuntimeError::AssertionFailed(e.to_string()))?;
                self.requester = Some(requester);
                Ok(())
            }
            "Request" => {
                let Some(requester) = self.requester.clone() else {
                    return Err(RuntimeError::unhandled(cx.id(), event));
                };
                if cx.random_bool()? {
                    cx.send(&requester, Event::new("Response"))
                } else {
                    cx.invoke_action("drop request");
                    Ok(())
                }
            }
            _ => Err(RuntimeError::unhandled(cx.id(), event)),
        }
    }
}

fn unanswered_request(rt: &mut Runtime) -> Result<(), RuntimeError> {
    rt.register_monitor(Responsiveness::default());
    let server = rt.create_actor("Server", FlakyServer { requester: None });
    let requester = rt.create_actor("Requester", Requester { server: server.clone() });
    let hello = serde_json::to_value(&requester).map_err(|e| RuntimeError::Config(e.to_string()))?;
    rt.send(&server, Event::with_payload("Hello", hello))
}
