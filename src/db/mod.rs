use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod helpers;
mod migrations;
mod repositories;

use migrations::run_migrations;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Message {
    Run(Job),
    Stop,
}

struct Worker {
    path: PathBuf,
    jobs: mpsc::Sender<Message>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return;
        };

        if self.jobs.send(Message::Stop).is_err() {
            error!("Archive thread already gone at shutdown");
        }
        if let Err(err) = handle.join() {
            error!("Archive thread panicked: {err:?}");
        }
    }
}

fn open_archive(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path).context("failed to open SQLite archive")?;
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        error!("Failed to enable WAL mode: {err}");
    }
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set archive busy timeout")?;
    run_migrations(&mut conn).context("failed to run archive migrations")?;
    Ok(conn)
}

fn serve(path: PathBuf, ready: mpsc::Sender<Result<()>>, inbox: mpsc::Receiver<Message>) {
    let mut conn = match open_archive(&path) {
        Ok(conn) => conn,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    for message in inbox {
        match message {
            Message::Run(job) => job(&mut conn),
            Message::Stop => break,
        }
    }
    info!("Archive thread stopped");
}

/// Local prediction archive. The SQLite connection lives on one dedicated
/// thread; async callers hand it closures through [`Database::execute`].
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
}

impl Database {
    /// Opens (or creates) the archive and brings its schema up to date.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let (jobs, inbox) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let thread_path = path.clone();
        let handle = thread::Builder::new()
            .name("coconut-guardian-db".into())
            .spawn(move || serve(thread_path, ready_tx, inbox))
            .context("failed to spawn archive thread")?;

        ready_rx
            .recv()
            .context("archive thread exited before it was ready")??;
        info!("Prediction archive ready at {}", path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                path,
                jobs,
                thread: Mutex::new(Some(handle)),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.worker.path
    }

    pub async fn execute<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let message = Message::Run(Box::new(move |conn| {
            let _ = reply_tx.send(job(conn));
        }));

        self.worker
            .jobs
            .send(message)
            .map_err(|_| anyhow!("archive thread is not running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("archive thread dropped the request"))?
    }
}
