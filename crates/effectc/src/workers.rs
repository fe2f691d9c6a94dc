use std::thread;

use crossbeam_channel::bounded;
use tracing::{debug, warn};

use crate::backend::{IncludeResolver, ShaderBackend};
use crate::codegen::ENTRY_POINT;
use crate::descriptor::Bytecode;

pub(crate) type PassResult = Result<Bytecode, String>;

/// Generated source of one pass awaiting compilation.
#[derive(Debug)]
pub(crate) struct CompileJob<'a> {
    pub label: String,
    pub source: &'a str,
}

/// Compiles every job and returns results in job order.
///
/// The calling thread compiles the first job while up to `workers` scoped
/// threads take the rest from a queue. Each job writes only its own result
/// slot. When no worker can be started the caller compiles everything
/// itself.
pub(crate) fn compile_all(
    jobs: &[CompileJob<'_>],
    backend: &dyn ShaderBackend,
    includes: &dyn IncludeResolver,
    workers: usize,
) -> Vec<PassResult> {
    let compile = |job: &CompileJob<'_>| backend.compile(job.source, ENTRY_POINT, &job.label, includes);

    let Some((first, rest)) = jobs.split_first() else {
        return Vec::new();
    };
    if rest.is_empty() {
        return vec![compile(first)];
    }

    let mut slots: Vec<Option<PassResult>> = Vec::new();
    slots.resize_with(jobs.len(), || None);

    {
        let (first_slot, rest_slots) = slots.split_at_mut(1);
        let (sender, receiver) = bounded(rest.len());
        for work in rest.iter().zip(rest_slots.iter_mut()) {
            if sender.send(work).is_err() {
                break;
            }
        }
        drop(sender);

        thread::scope(|scope| {
            let mut spawned = 0;
            for id in 0..workers.min(rest.len()) {
                let receiver = receiver.clone();
                let spawn = thread::Builder::new()
                    .name(format!("effectc-compile-{id}"))
                    .spawn_scoped(scope, move || {
                        for (job, slot) in receiver.iter() {
                            *slot = Some(compile(job));
                        }
                    });
                match spawn {
                    Ok(_) => spawned += 1,
                    Err(err) => {
                        warn!(error = %err, "failed to start compile worker");
                        break;
                    }
                }
            }
            if spawned == 0 {
                warn!(passes = jobs.len(), "no compile workers available; compiling sequentially");
            } else {
                debug!(workers = spawned, passes = jobs.len(), "compiling passes in parallel");
            }

            first_slot[0] = Some(compile(first));

            // Picks up whatever the workers have not claimed yet.
            for (job, slot) in receiver.try_iter() {
                *slot = Some(compile(job));
            }
        });
    }

    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err("compile job was never run".to_string())))
        .collect()
}
