use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing_subscriber::EnvFilter;

use taskcycle_core::config::TaskConfig;
use taskcycle_core::domain::BoxError;
use taskcycle_core::engine::{AsyncTask, SyncTask, Task, TaskAction, TaskContext};
use taskcycle_core::impls::EventLoopContext;
use taskcycle_core::listener::{EventRecorder, TaskEvent, TaskLogger};
use taskcycle_core::TaskEndStatus;

/// Run a demo task through its lifecycle and print what listeners saw.
#[derive(Debug, Parser)]
#[command(name = "taskcycle", version)]
struct Args {
    /// Task name
    #[arg(long, default_value = "demo")]
    name: String,

    /// How long the action works, in milliseconds
    #[arg(long, default_value_t = 500)]
    work_ms: u64,

    /// Watchdog timeout in milliseconds (async mode only)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// JSON file with task settings; its fields override the flags above
    #[arg(long)]
    config: Option<PathBuf>,

    /// Make the action fail
    #[arg(long)]
    fail: bool,

    /// Decline the run in the before hook
    #[arg(long)]
    skip: bool,

    /// Poll the stop flag and return early once a stop is asked
    #[arg(long)]
    cooperative: bool,

    /// Run the whole lifecycle in one blocking perform() call
    #[arg(long)]
    sync: bool,

    /// Print the recorded events as JSON
    #[arg(long)]
    json: bool,
}

struct DemoAction {
    work: Duration,
    fail: bool,
    skip: bool,
    cooperative: bool,
}

impl TaskAction for DemoAction {
    fn initialize(&self, task: &TaskContext) {
        task.add_listener(Arc::new(TaskLogger::new(task.name())));
    }

    fn before_action(&self, task: &TaskContext) -> Result<bool, BoxError> {
        task.send_message("preparing {} ms of work", &[&self.work.as_millis()]);
        Ok(!self.skip)
    }

    fn perform_action(&self, task: &TaskContext) -> Result<(), BoxError> {
        let step = Duration::from_millis(50);
        let mut done = Duration::ZERO;
        while done < self.work {
            if self.cooperative && task.is_stop_asked() {
                task.send_message("stop asked after {} ms, leaving early", &[&done.as_millis()]);
                return Ok(());
            }
            std::thread::sleep(step.min(self.work - done));
            done += step;
        }
        if self.fail {
            return Err("demo failure requested with --fail".into());
        }
        task.send_message("work done", &[]);
        Ok(())
    }

    fn after_action(&self, task: &TaskContext) -> Result<(), BoxError> {
        task.send_message("cleaning up", &[]);
        Ok(())
    }
}

fn load_config(args: &Args) -> Result<TaskConfig, Box<dyn Error>> {
    let mut config = TaskConfig {
        name: Some(args.name.clone()),
        timeout_ms: args.timeout_ms,
    };
    if let Some(path) = &args.config {
        let text = std::fs::read_to_string(path)?;
        let file: TaskConfig = serde_json::from_str(&text)?;
        if file.name.is_some() {
            config.name = file.name;
        }
        if file.timeout_ms.is_some() {
            config.timeout_ms = file.timeout_ms;
        }
    }
    Ok(config)
}

/// `perform()` may block for the whole run (always so for `SyncTask`), so it
/// goes to the blocking pool instead of a runtime worker.
async fn perform_off_runtime(task: Arc<dyn Task>) -> Result<(), JoinError> {
    tokio::task::spawn_blocking(move || task.perform()).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let name = config.name.clone().unwrap_or_else(|| args.name.clone());

    let results = Arc::new(EventLoopContext::spawn("taskcycle-results")?);
    let action = DemoAction {
        work: Duration::from_millis(args.work_ms),
        fail: args.fail,
        skip: args.skip,
        cooperative: args.cooperative,
    };

    let task: Arc<dyn Task> = if args.sync {
        Arc::new(SyncTask::with_result_context(name, action, results.clone()))
    } else {
        Arc::new(
            AsyncTask::builder(name, action)
                .config(&config)
                .result_context(results.clone())
                .build()?,
        )
    };

    let recorder = Arc::new(EventRecorder::new());
    task.add_listener(recorder.clone());
    task.add_completion_listener(recorder.clone());

    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    task.add_completion_listener(Arc::new(move |end_status: TaskEndStatus| {
        let _ = done_tx.send(end_status);
    }));

    perform_off_runtime(task.clone()).await?;
    let end_status = done_rx.recv().await;

    // flush queued notifications before reading the recorder
    let loop_context = results.clone();
    tokio::task::spawn_blocking(move || loop_context.shutdown()).await??;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&recorder.events())?);
    } else {
        for recorded in recorder.events() {
            let line = match recorded.event {
                TaskEvent::StatusChange { from, to } => format!("status   {from} -> {to}"),
                TaskEvent::Message { text } => format!("message  {text}"),
                TaskEvent::Error { message, cause, .. } => format!("error    {message}: {cause}"),
                TaskEvent::Finished { end_status } => format!("finished {end_status}"),
            };
            println!("{} {line}", recorded.at.format("%H:%M:%S%.3f"));
        }
    }

    match end_status {
        Some(end_status) if end_status.is_success() => Ok(()),
        Some(end_status) => Err(format!("task {} ended with {end_status}", task.name()).into()),
        None => Err(format!("task {} ended without a completion event", task.name()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskcycle_core::TaskStatus;

    #[tokio::test(flavor = "current_thread")]
    async fn sync_run_leaves_the_runtime_free() {
        let task: Arc<dyn Task> = Arc::new(SyncTask::new(
            "blocking",
            DemoAction {
                work: Duration::from_millis(300),
                fail: false,
                skip: false,
                cooperative: false,
            },
        ));

        let observer = task.clone();
        let (performed, status_mid_run) = tokio::join!(perform_off_runtime(task), async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            observer.status()
        });

        performed.unwrap();
        assert_eq!(status_mid_run, TaskStatus::Started);
    }
}
