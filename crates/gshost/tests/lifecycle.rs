//! End-to-end protocol tests against the scripted stub engine.
//!
//! Every test that creates an instance goes through `Engine::acquire`, which
//! serializes the tests on the process-wide instance slot exactly like real
//! callers would be.

use gshost::testing::{emitting_stub, fatal_init_stub, Script, StubEngine};
use gshost::{
    BufferStdio, DisplayCaps, DisplayFormat, DisplayHandler, Engine, GsError, Outcome, Phase,
    Poll, MAX_RUN_STRING_BYTES,
};
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct NullDisplay;

impl DisplayHandler for NullDisplay {
    fn caps(&self) -> DisplayCaps {
        DisplayCaps {
            update: true,
            ..DisplayCaps::default()
        }
    }

    fn size(&mut self, _: i32, _: i32, _: i32, _: DisplayFormat, _: *mut u8) {}
    fn page(&mut self, _: i32, _: bool) {}
}

#[test]
fn second_acquire_fails_fast_without_disturbing_the_first() -> anyhow::Result<()> {
    let stub = emitting_stub(b"first instance output".to_vec());
    let mut engine = Engine::acquire(stub.clone())?;

    let refused = Engine::try_acquire(stub.clone());
    assert!(matches!(refused, Err(GsError::InstanceAlreadyActive)));

    // The refusal was local: the live instance saw no calls and keeps
    // working.
    assert!(stub.is_live());
    assert_eq!(stub.delete_calls(), 0);
    assert_eq!(engine.init_with_args(["-dNOPAUSE"])?, Outcome::Done);
    let (outcome, _) = engine.run_string(b"1 2 add ==".as_slice(), 0)?;
    assert_eq!(outcome, Outcome::Done);

    engine.exit()?;
    engine.finish()?;

    // The slot frees on deletion; a fresh acquire succeeds.
    let engine = Engine::acquire(stub.clone())?;
    assert_eq!(engine.phase(), Phase::Created);
    drop(engine);
    Ok(())
}

#[test]
fn never_initialized_instance_deletes_without_exit() -> anyhow::Result<()> {
    let stub = emitting_stub(Vec::new());
    let engine = Engine::acquire(stub.clone())?;
    engine.finish()?;
    assert_eq!(stub.exit_calls(), 0);
    assert_eq!(stub.delete_calls(), 1);
    assert!(!stub.is_live());
    Ok(())
}

#[test]
fn drop_performs_the_owed_teardown() -> anyhow::Result<()> {
    let stub = emitting_stub(Vec::new());
    {
        let mut engine = Engine::acquire(stub.clone())?;
        engine.init_with_args(["-dNOPAUSE"])?;
        // Neither exit nor finish: the Drop backstop owes both.
    }
    assert_eq!(stub.exit_calls(), 1);
    assert_eq!(stub.delete_calls(), 1);
    Ok(())
}

#[test]
fn empty_session_completes_without_engine_restart() -> anyhow::Result<()> {
    let stub = StubEngine::new(Script::default());
    let mut engine = Engine::acquire(stub.clone())?;
    engine.init_with_args(["-dNOPAUSE"])?;

    let session = engine.begin_session(0)?;
    let (outcome, exit_code) = session.end()?;
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(exit_code, 0);

    // Same instance stays runnable afterwards.
    let (outcome, _) = engine.run_string(b"42 ==".as_slice(), 0)?;
    assert_eq!(outcome, Outcome::Done);

    engine.exit()?;
    engine.finish()?;
    Ok(())
}

#[test]
fn oversized_chunk_is_rejected_before_reaching_the_engine() -> anyhow::Result<()> {
    let stub = StubEngine::new(Script::default());
    let mut engine = Engine::acquire(stub.clone())?;
    engine.init_with_args(["-dNOPAUSE"])?;

    let mut session = engine.begin_session(0)?;
    let oversized = vec![b'x'; MAX_RUN_STRING_BYTES + 1];
    let err = session.feed(&oversized).unwrap_err();
    assert!(matches!(err, GsError::ChunkTooLarge(len) if len == MAX_RUN_STRING_BYTES + 1));
    assert!(stub.fed_input().is_empty());

    // The rejection is local; the session itself is unharmed.
    assert_eq!(session.feed(b"good chunk")?, Outcome::NeedInput);
    session.end()?;

    engine.exit()?;
    engine.finish()?;
    Ok(())
}

#[test]
fn long_run_string_is_split_across_the_session_protocol() -> anyhow::Result<()> {
    let stub = StubEngine::new(Script::default());
    let mut engine = Engine::acquire(stub.clone())?;
    engine.init_with_args(["-dNOPAUSE"])?;

    let input: Vec<u8> = (0..150_000u32).map(|i| (i % 251) as u8).collect();
    let (outcome, _) = engine.run_string(&input, 0)?;
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(stub.fed_input(), input);

    engine.exit()?;
    engine.finish()?;
    Ok(())
}

#[test]
fn empty_chunk_signals_end_of_input() -> anyhow::Result<()> {
    let stub = StubEngine::new(Script::default());
    let mut engine = Engine::acquire(stub.clone())?;
    engine.init_with_args(["-dNOPAUSE"])?;

    let mut session = engine.begin_session(0)?;
    assert_eq!(session.feed(b"0 1 2 3")?, Outcome::NeedInput);
    assert_eq!(session.feed(b"")?, Outcome::Done);
    assert!(stub.eof_seen());
    session.end()?;

    engine.exit()?;
    engine.finish()?;
    Ok(())
}

#[test]
fn display_registration_after_init_is_an_ordering_violation() -> anyhow::Result<()> {
    let stub = StubEngine::new(Script::default());
    let mut engine = Engine::acquire(stub.clone())?;
    engine.init_with_args(["-dNOPAUSE"])?;

    let err = engine.set_display(NullDisplay).unwrap_err();
    assert!(matches!(
        err,
        GsError::InvalidSequence {
            op: "set_display",
            phase: Phase::Initialized,
        }
    ));
    assert!(!stub.display_registered());

    engine.exit()?;
    engine.finish()?;
    Ok(())
}

#[test]
fn display_registration_before_init_reaches_the_engine() -> anyhow::Result<()> {
    let stub = StubEngine::new(Script::default());
    let mut engine = Engine::acquire(stub.clone())?;
    engine.set_display(NullDisplay)?;
    assert!(stub.display_registered());
    engine.init_with_args(["-sDEVICE=display"])?;
    engine.exit()?;
    engine.finish()?;
    Ok(())
}

#[test]
fn captured_stdio_sees_exactly_the_emitted_bytes() -> anyhow::Result<()> {
    let emitted = b"GPL Ghostscript: trivial page rendered\n".to_vec();
    let warned = b"**** warning: stub diagnostics\n".to_vec();
    let stub = StubEngine::new(Script {
        run_output: emitted.clone(),
        run_errors: warned.clone(),
        ..Script::default()
    });
    let mut engine = Engine::acquire(stub.clone())?;

    let stdio = BufferStdio::new(Vec::new());
    let sink = stdio.output();
    let err_sink = stdio.errors();
    engine.set_stdio(stdio)?;

    assert_eq!(engine.init_with_args(["-sDEVICE=display"])?, Outcome::Done);
    assert_eq!(stub.init_args(), vec!["-sDEVICE=display".to_owned()]);

    let (outcome, exit_code) = engine.run_string(b"showpage".as_slice(), 0)?;
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(exit_code, 0);
    assert_eq!(sink.lock().unwrap().as_slice(), emitted.as_slice());
    assert_eq!(err_sink.lock().unwrap().as_slice(), warned.as_slice());

    engine.exit()?;
    engine.finish()?;
    Ok(())
}

#[test]
fn stdin_handler_feeds_the_engine() -> anyhow::Result<()> {
    let stub = StubEngine::new(Script {
        stdin_request: Some(16),
        ..Script::default()
    });
    let mut engine = Engine::acquire(stub.clone())?;
    engine.set_stdio(BufferStdio::new(b"quit\n".to_vec()))?;
    engine.init_with_args(["-dNOPAUSE"])?;
    engine.run_string(b"executive".as_slice(), 0)?;
    assert_eq!(stub.stdin_seen(), b"quit\n");
    engine.exit()?;
    engine.finish()?;
    Ok(())
}

#[test]
fn fatal_init_leaves_only_the_teardown_path() -> anyhow::Result<()> {
    let stub = fatal_init_stub();
    let mut engine = Engine::acquire(stub.clone())?;

    let outcome = engine.init_with_args(["-sDEVICE=no_such_device"])?;
    assert!(outcome.is_fatal());
    assert_eq!(engine.phase(), Phase::AwaitingExit);

    assert!(matches!(
        engine.run_string(b"1 ==".as_slice(), 0),
        Err(GsError::InvalidSequence { op: "run_string", .. })
    ));
    assert!(matches!(
        engine.run_file("/tmp/nope.ps", 0),
        Err(GsError::InvalidSequence { op: "run_file", .. })
    ));
    assert!(matches!(
        engine.begin_session(0).err(),
        Some(GsError::InvalidSequence { op: "run_string_begin", .. })
    ));

    engine.exit()?;
    engine.finish()?;
    assert_eq!(stub.exit_calls(), 1);
    assert_eq!(stub.delete_calls(), 1);
    Ok(())
}

#[test]
fn soft_quit_from_init_still_owes_an_exit() -> anyhow::Result<()> {
    let stub = StubEngine::new(Script {
        init_code: Outcome::Quit.raw(),
        ..Script::default()
    });
    let mut engine = Engine::acquire(stub.clone())?;
    assert_eq!(engine.init_with_args(["-h"])?, Outcome::Quit);
    assert_eq!(engine.phase(), Phase::AwaitingExit);
    engine.exit()?;
    engine.finish()?;
    Ok(())
}

#[test]
fn poll_cancellation_interrupts_a_session_run() -> anyhow::Result<()> {
    let stub = StubEngine::new(Script::default());
    let mut engine = Engine::acquire(stub.clone())?;

    let polls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&polls);
    engine.set_poll(move || {
        // Cooperative cancel after the second checkpoint.
        if counter.fetch_add(1, Ordering::SeqCst) >= 2 {
            Poll::Cancel
        } else {
            Poll::Continue
        }
    })?;
    engine.init_with_args(["-dNOPAUSE"])?;

    let mut session = engine.begin_session(0)?;
    assert_eq!(session.feed(b"chunk one")?, Outcome::NeedInput);
    assert_eq!(session.feed(b"chunk two")?, Outcome::NeedInput);
    assert_eq!(session.feed(b"chunk three")?, Outcome::Interrupted);
    assert!(polls.load(Ordering::SeqCst) >= 3);

    // Cleanup is still orderly after an interrupt.
    session.end()?;
    engine.exit()?;
    engine.finish()?;
    assert_eq!(stub.delete_calls(), 1);
    Ok(())
}

#[test]
fn poll_cancellation_interrupts_a_one_shot_run() -> anyhow::Result<()> {
    let stub = emitting_stub(b"never delivered".to_vec());
    let mut engine = Engine::acquire(stub.clone())?;
    engine.set_poll(|| Poll::Cancel)?;
    engine.init_with_args(["-dNOPAUSE"])?;

    let (outcome, _) = engine.run_string(b"heavy job".as_slice(), 0)?;
    assert_eq!(outcome, Outcome::Interrupted);

    engine.exit()?;
    engine.finish()?;
    Ok(())
}

#[test]
fn run_file_passes_the_path_through() -> anyhow::Result<()> {
    let mut ps_file = tempfile::NamedTempFile::new()?;
    ps_file.write_all(b"%!PS\nshowpage\n")?;

    let stub = StubEngine::new(Script::default());
    let mut engine = Engine::acquire(stub.clone())?;
    engine.init_with_args(["-dNOPAUSE", "-dBATCH"])?;

    let (outcome, exit_code) = engine.run_file(ps_file.path(), 0)?;
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(exit_code, 0);
    assert_eq!(
        stub.last_file().as_deref(),
        Some(ps_file.path().to_string_lossy().as_ref())
    );

    engine.exit()?;
    engine.finish()?;
    Ok(())
}

#[test]
fn dropping_an_open_session_closes_it() -> anyhow::Result<()> {
    let stub = StubEngine::new(Script::default());
    let mut engine = Engine::acquire(stub.clone())?;
    engine.init_with_args(["-dNOPAUSE"])?;

    {
        let mut session = engine.begin_session(0)?;
        session.feed(b"partial input")?;
        // Dropped without end(): the session must still release.
    }

    // The instance is consistent: another run works and teardown is clean.
    let (outcome, _) = engine.run_string(b"1 ==".as_slice(), 0)?;
    assert_eq!(outcome, Outcome::Done);
    engine.exit()?;
    engine.finish()?;
    Ok(())
}

#[test]
fn revision_is_queryable_through_the_engine() -> anyhow::Result<()> {
    let stub = StubEngine::new(Script::default());
    let engine = Engine::acquire(stub.clone())?;
    let revision = engine.revision()?;
    assert_eq!(revision.revision, 860);
    assert_eq!(revision.revision_date, 20070801);
    assert_eq!(revision.product, "gshost stub engine");
    engine.finish()?;
    Ok(())
}
