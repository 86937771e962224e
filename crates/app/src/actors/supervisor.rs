use std::{collections::HashMap, time::Duration};
use tracing::{error, warn};
use uuid::Uuid;

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};

use common::actors::{Actor, ActorType, ControlMessage};

type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

pub struct Supervisor {
    actor_factories: HashMap<ActorType, ActorFactory>,
    // Instance id -> role, so a heartbeat from an aborted instance cannot
    // refresh the pulse of its replacement.
    instances: HashMap<Uuid, ActorType>,
    pulses: HashMap<ActorType, Instant>,
    handles: HashMap<ActorType, JoinHandle<()>>,
    tx: mpsc::Sender<ControlMessage>,
    rx: Option<mpsc::Receiver<ControlMessage>>,
}

impl Supervisor {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<ControlMessage>(512);
        Self {
            actor_factories: HashMap::new(),
            instances: HashMap::new(),
            pulses: HashMap::new(),
            handles: HashMap::new(),
            tx,
            rx: Some(rx),
        }
    }

    pub fn register_actor(&mut self, actor_type: ActorType, factory: ActorFactory) {
        self.actor_factories.insert(actor_type, factory);
    }

    pub async fn start(&mut self) {
        let mut check_interval = time::interval(Duration::from_secs(1));
        let timeout_duration = Duration::from_secs(3);

        let mut rx = self.rx.take().expect("Supervisor can only be started once");

        let actors: Vec<ActorType> = self.actor_factories.keys().copied().collect();
        for actor in actors {
            self.spawn_actor(actor);
        }

        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    match msg {
                        ControlMessage::Heartbeat(id) => {
                            if let Some(&actor_type) = self.instances.get(&id) {
                                self.pulses.insert(actor_type, Instant::now());
                            }
                        }
                        ControlMessage::Shutdown(id) => {
                            if let Some(actor_type) = self.instances.remove(&id) {
                                warn!("{:?} is shutting down gracefully.", actor_type);
                                self.pulses.remove(&actor_type);
                                if let Some(handle) = self.handles.remove(&actor_type) {
                                    handle.abort();
                                }
                            }
                        }
                        ControlMessage::Error(id, error_msg) => {
                            if let Some(&actor_type) = self.instances.get(&id) {
                                error!("Actor {:?} reported error: {}", actor_type, error_msg);
                                // An actor talking to us is an actor still alive.
                                self.pulses.insert(actor_type, Instant::now());
                            }
                        }
                    }
                }

                _ = check_interval.tick() => {
                    let dead_timeout = Instant::now() - timeout_duration;

                    let dead_actors: Vec<ActorType> = self
                        .pulses
                        .iter()
                        .filter(|&(_, &pulse)| pulse < dead_timeout)
                        .map(|(&actor_type, _)| actor_type)
                        .collect();

                    for actor_type in dead_actors {
                        warn!("{:?} is unresponsive!", actor_type);
                        if let Some(handle) = self.handles.get(&actor_type) {
                            handle.abort();
                        }
                        self.spawn_actor(actor_type);
                    }
                }
            }
        }
    }

    fn spawn_actor(&mut self, actor_type: ActorType) {
        let mut new_actor = self.actor_factories[&actor_type]();
        let tx = self.tx.clone();

        self.instances.retain(|_, t| *t != actor_type);
        self.instances.insert(new_actor.id(), actor_type);

        let handle = tokio::spawn(async move {
            if let Err(e) = new_actor.run(tx).await {
                error!("Actor {:?} crashed: {}", actor_type, e);
            }
        });
        self.handles.insert(actor_type, handle);
        self.pulses.insert(actor_type, Instant::now());
    }
}
