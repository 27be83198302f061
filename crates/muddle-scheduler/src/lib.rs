//! The scheduler (C7, §4.4): turns a [`RuleSet`] and a target label into
//! a sequence of claimed, run, and completed rules.
//!
//! A worker repeatedly scans the build order for a target whose deps are
//! all satisfied and whose claim it wins, runs its action, and records
//! the outcome. `run_scheduler` runs several such workers as threads
//! sharing one build tree, each opening its own database connection —
//! SQLite's own locking serialises the conditional-update transactions
//! that decide who gets to run what.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use muddle_errors::{MuddleError, classify};
use muddle_label::Label;
use muddle_rules::{BuildContext, RuleSet};
use muddle_store::TagStore;

const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(25);
const STALL_RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// What happened while driving a target to completion.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub completed: Vec<Label>,
    /// Rules whose action gave up; the run continued past each one
    /// unless `stop_on_failure` was set (§4.4 "Failure semantics").
    pub gave_up: Vec<(Label, String)>,
    /// Rules an action reported as non-fatally unsupported.
    pub unsupported: Vec<(Label, String)>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.gave_up.is_empty()
    }

    fn absorb(&mut self, other: BuildReport) {
        self.completed.extend(other.completed);
        self.gave_up.extend(other.gave_up);
        self.unsupported.extend(other.unsupported);
    }
}

/// Compute the build order for `target` and register every non-done,
/// non-transient step in the persistent frontier (§4.3, §4.4 step 2).
///
/// Transient targets (I3) are returned in the order but are never
/// written to the store: ownership of a transient step is always
/// granted in-process (see [`TagStore::try_claim`]), so there is
/// nothing to persist for it.
pub fn populate_frontier(
    ruleset: &RuleSet,
    store: &mut TagStore,
    target: &Label,
    use_match: bool,
) -> Result<Vec<Label>> {
    let order = ruleset.needed_to_build(target, use_match)?;
    for label in &order {
        if label.transient || store.is_tag_done(label)? {
            continue;
        }
        let Some(rule) = ruleset.rules_for_target(label, false).into_iter().next() else {
            continue;
        };
        let req_master = rule.requires_master();
        store.upsert_rule(label, req_master, label.transient)?;
        let deps: Vec<Label> = ruleset.resolved_deps(rule).into_iter().collect();
        store.replace_rule_deps(label, &deps)?;
        store.add_to_frontier(label, req_master)?;
    }
    Ok(order)
}

/// Run the worker loop described in §4.4 over a precomputed `order`
/// until every step is done or the run gives up.
///
/// `order` is scanned from the front each round; a step is run once its
/// deps are done and this worker wins its claim. `as_master` gates
/// steps whose action reports `requires_master()`.
pub fn run(
    ruleset: &RuleSet,
    store: &mut TagStore,
    ctx: &mut dyn BuildContext,
    order: &[Label],
    as_master: bool,
    stop_on_failure: bool,
) -> Result<BuildReport> {
    let mut report = BuildReport::default();
    let mut failed: std::collections::BTreeSet<Label> = std::collections::BTreeSet::new();

    loop {
        if store.is_pause_requested()? {
            store.set_paused(true)?;
            while store.is_pause_requested()? {
                std::thread::sleep(PAUSE_POLL_INTERVAL);
            }
            store.set_paused(false)?;
        }

        let mut progressed = false;
        for target in order {
            if store.is_tag_done(target)? || failed.contains(target) {
                continue;
            }
            let Some(rule) = ruleset.rules_for_target(target, false).into_iter().next() else {
                continue;
            };
            if rule.requires_master() && !as_master {
                continue;
            }
            let mut deps_satisfied = true;
            for dep in ruleset.resolved_deps(rule) {
                if !store.is_tag_done(&dep)? {
                    deps_satisfied = false;
                    break;
                }
            }
            if !deps_satisfied || !store.try_claim(target)? {
                continue;
            }

            ctx.reporter().action_started(&target.to_string());
            let outcome = match &rule.action {
                Some(action) => action.build_label(ctx, target),
                None => Ok(()),
            };
            match outcome {
                Ok(()) => {
                    store.mark_done(target)?;
                    ctx.reporter().action_finished(&target.to_string(), "done");
                    report.completed.push(target.clone());
                    progressed = true;
                }
                Err(err) => {
                    store.mark_clear(target)?;
                    match classify(&err) {
                        Some(MuddleError::GiveUp { message }) => {
                            ctx.reporter().error(message);
                            report.gave_up.push((target.clone(), message.clone()));
                            failed.insert(target.clone());
                            if stop_on_failure {
                                return Ok(report);
                            }
                        }
                        Some(MuddleError::Unsupported { message }) => {
                            ctx.reporter().warn(message);
                            report.unsupported.push((target.clone(), message.clone()));
                            failed.insert(target.clone());
                        }
                        _ => return Err(err),
                    }
                }
            }
        }

        if !progressed {
            if order.iter().try_fold(true, |acc, t| -> Result<bool> {
                Ok(acc && store.is_tag_done(t)?)
            })? {
                break;
            }
            if store.process_count()? <= 1 && store.processing_count()? == 0 {
                // Nobody else can make progress either; this is as far
                // as this process can take the build.
                break;
            }
            std::thread::sleep(STALL_RETRY_INTERVAL);
        }
    }

    Ok(report)
}

/// Run `worker_count` worker loops (default: available parallelism) as
/// threads sharing one build tree, each with its own store connection
/// and its own `BuildContext` built by `ctx_factory` (§4.4 "Parallel
/// worker pool").
pub fn run_scheduler<F>(
    ruleset: &RuleSet,
    root: &Path,
    order: &[Label],
    worker_count: Option<usize>,
    stop_on_failure: bool,
    ctx_factory: F,
) -> Result<BuildReport>
where
    F: Fn() -> Box<dyn BuildContext> + Sync,
{
    let worker_count = worker_count
        .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
        .max(1);

    let results: Vec<Result<BuildReport>> = std::thread::scope(|scope| {
        let ctx_factory = &ctx_factory;
        let handles: Vec<_> = (0..worker_count)
            .map(|_| {
                scope.spawn(move || -> Result<BuildReport> {
                    let mut store = TagStore::open(root)?;
                    store.register_process()?;
                    store.attempt_become_master()?;
                    let as_master = store.is_master()?;
                    let mut ctx = ctx_factory();
                    let result = run(ruleset, &mut store, ctx.as_mut(), order, as_master, stop_on_failure);
                    let _ = store.unregister_process();
                    result
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("worker thread panicked")).collect()
    });

    let mut combined = BuildReport::default();
    for result in results {
        combined.absorb(result?);
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use muddle_config::{Config, SilentReporter};
    use muddle_label::LabelType;
    use muddle_rules::{Action, FnAction, NoOpAction, Rule};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    struct TestContext {
        root: std::path::PathBuf,
        config: Config,
    }

    impl BuildContext for TestContext {
        fn root(&self) -> &Path {
            &self.root
        }
        fn config(&self) -> &Config {
            &self.config
        }
        fn reporter(&self) -> &dyn muddle_config::Reporter {
            &SilentReporter
        }
        fn register_rule(&mut self, _rule: Rule) -> Result<()> {
            Ok(())
        }
    }

    fn label(lt: LabelType, name: &str, tag: &str) -> Label {
        Label::new(lt, name, tag)
    }

    #[test]
    fn runs_chain_in_order_and_records_completion() {
        let dir = tempdir().unwrap();
        let mut store = TagStore::open(dir.path()).unwrap();

        let l1 = label(LabelType::Checkout, "co_1", "checked_out");
        let l2 = label(LabelType::Package, "pkg_1", "built");

        let ran = Arc::new(std::sync::Mutex::new(Vec::new()));
        let ran_1 = ran.clone();
        let ran_2 = ran.clone();

        let mut rules = RuleSet::new();
        rules.add(Rule::new(
            l1.clone(),
            Some(Box::new(FnAction(move |_ctx: &mut dyn BuildContext, t: &Label| {
                ran_1.lock().unwrap().push(t.clone());
                Ok(())
            }))),
            Default::default(),
        ));
        rules.add(Rule::new(
            l2.clone(),
            Some(Box::new(FnAction(move |_ctx: &mut dyn BuildContext, t: &Label| {
                ran_2.lock().unwrap().push(t.clone());
                Ok(())
            }))),
            [l1.clone()].into(),
        ));

        let order = populate_frontier(&rules, &mut store, &l2, false).unwrap();
        let mut ctx = TestContext {
            root: dir.path().to_path_buf(),
            config: Config::default(),
        };
        let report = run(&rules, &mut store, &mut ctx, &order, true, false).unwrap();

        assert_eq!(report.completed, vec![l1.clone(), l2.clone()]);
        assert_eq!(*ran.lock().unwrap(), vec![l1, l2]);
        assert!(store.is_tag_done(&l2).unwrap());
    }

    #[test]
    fn give_up_is_recorded_and_rule_is_clear_for_retry() {
        let dir = tempdir().unwrap();
        let mut store = TagStore::open(dir.path()).unwrap();
        let target = label(LabelType::Package, "pkg_1", "built");

        let mut rules = RuleSet::new();
        rules.add(Rule::new(
            target.clone(),
            Some(Box::new(FnAction(|_ctx: &mut dyn BuildContext, _t: &Label| {
                muddle_errors::give_up!("missing upstream revision")
            }))),
            Default::default(),
        ));

        let order = populate_frontier(&rules, &mut store, &target, false).unwrap();
        let mut ctx = TestContext {
            root: dir.path().to_path_buf(),
            config: Config::default(),
        };
        let report = run(&rules, &mut store, &mut ctx, &order, true, false).unwrap();

        assert_eq!(report.gave_up.len(), 1);
        assert!(!report.is_clean());
        assert!(!store.is_tag_done(&target).unwrap());
        assert_eq!(
            store.rule_status(&target).unwrap(),
            Some(muddle_store::RuleStatus::Clear)
        );
    }

    #[test]
    fn bug_error_aborts_the_run() {
        let dir = tempdir().unwrap();
        let mut store = TagStore::open(dir.path()).unwrap();
        let target = label(LabelType::Package, "pkg_1", "built");

        let mut rules = RuleSet::new();
        rules.add(Rule::new(
            target.clone(),
            Some(Box::new(FnAction(|_ctx: &mut dyn BuildContext, _t: &Label| {
                muddle_errors::muddle_bug!("invariant violated")
            }))),
            Default::default(),
        ));

        let order = populate_frontier(&rules, &mut store, &target, false).unwrap();
        let mut ctx = TestContext {
            root: dir.path().to_path_buf(),
            config: Config::default(),
        };
        assert!(run(&rules, &mut store, &mut ctx, &order, true, false).is_err());
    }

    #[test]
    fn master_only_rule_is_skipped_by_non_master_worker() {
        let dir = tempdir().unwrap();
        let mut store = TagStore::open(dir.path()).unwrap();
        let target = label(LabelType::Package, "pkg_1", "built");

        struct MasterOnly;
        impl Action for MasterOnly {
            fn build_label(&self, _ctx: &mut dyn BuildContext, _target: &Label) -> Result<()> {
                Ok(())
            }
            fn requires_master(&self) -> bool {
                true
            }
        }

        let mut rules = RuleSet::new();
        rules.add(Rule::new(target.clone(), Some(Box::new(MasterOnly)), Default::default()));

        let order = populate_frontier(&rules, &mut store, &target, false).unwrap();
        let mut ctx = TestContext {
            root: dir.path().to_path_buf(),
            config: Config::default(),
        };
        let report = run(&rules, &mut store, &mut ctx, &order, false, false).unwrap();
        assert!(report.completed.is_empty());
        assert!(!store.is_tag_done(&target).unwrap());
    }

    #[test]
    fn transient_target_runs_without_touching_the_database() {
        let dir = tempdir().unwrap();
        let mut store = TagStore::open(dir.path()).unwrap();
        let target = label(LabelType::Synth, "gather", "loaded").transient();

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let mut rules = RuleSet::new();
        rules.add(Rule::new(
            target.clone(),
            Some(Box::new(FnAction(move |_ctx: &mut dyn BuildContext, _t: &Label| {
                count_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))),
            Default::default(),
        ));

        let order = populate_frontier(&rules, &mut store, &target, false).unwrap();
        assert!(store.rule_status(&target).unwrap().is_none());

        let mut ctx = TestContext {
            root: dir.path().to_path_buf(),
            config: Config::default(),
        };
        let report = run(&rules, &mut store, &mut ctx, &order, true, false).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(report.completed, vec![target.clone()]);
        assert!(store.is_tag_done(&target).unwrap());
        // still never reached the database
        assert!(store.rule_status(&target).unwrap().is_none());
    }

    #[test]
    fn parallel_pool_completes_an_independent_fan_out() {
        let dir = tempdir().unwrap();
        let root_rule = label(LabelType::Synth, "all", "loaded");

        let mut rules = RuleSet::new();
        let mut deps = std::collections::BTreeSet::new();
        for i in 0..6 {
            let leaf = label(LabelType::Package, &format!("pkg_{i}"), "built");
            rules.add(Rule::new(leaf.clone(), Some(Box::new(NoOpAction)), Default::default()));
            deps.insert(leaf);
        }
        rules.add(Rule::new(root_rule.clone(), Some(Box::new(NoOpAction)), deps));

        let mut seed_store = TagStore::open(dir.path()).unwrap();
        let order = populate_frontier(&rules, &mut seed_store, &root_rule, false).unwrap();
        drop(seed_store);

        let root_path = dir.path().to_path_buf();
        let report = run_scheduler(&rules, dir.path(), &order, Some(4), false, move || {
            Box::new(TestContext {
                root: root_path.clone(),
                config: Config::default(),
            }) as Box<dyn BuildContext>
        })
        .unwrap();

        assert_eq!(report.completed.len(), 7);
        assert!(report.is_clean());
    }
}
