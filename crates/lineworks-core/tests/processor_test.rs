//! Processor behavior against a scripted engine.
//!
//! Every generate sequence is also run through `check_generation`, so the
//! ordering rules are verified on each path and not only where a test names
//! them.

use std::{thread, time::Duration};

use lineworks_core::{AbortFlag, Processor, request_queue, response_queue};
use lineworks_harness::{ScriptedEngine, Transcript, check_generation};
use lineworks_proto::{GenerateParams, LoadParams, Request, Response, StopCondition};

fn processor(engine: ScriptedEngine) -> (Processor, AbortFlag) {
    let abort = AbortFlag::new();
    (Processor::new(Box::new(engine), abort.clone()), abort)
}

fn loaded(engine: ScriptedEngine) -> (Processor, AbortFlag) {
    let (mut processor, abort) = processor(engine);
    let mut sink = Vec::new();
    processor.process(Request::Load(LoadParams::new("tiny")), &mut sink);
    assert_eq!(sink.last(), Some(&Response::Done));
    (processor, abort)
}

fn generate(processor: &mut Processor, params: GenerateParams) -> Vec<Response> {
    let mut sink = Vec::new();
    processor.process(Request::Generate(params), &mut sink);
    sink
}

#[test]
fn options_lists_models_and_device() {
    let engine = ScriptedEngine::new(["x"]).with_models(["alpha", "beta"]);
    let (mut processor, _) = processor(engine);
    let mut sink = Vec::new();

    processor.process(Request::Options, &mut sink);

    assert_eq!(sink, vec![Response::Options {
        models: vec!["alpha".into(), "beta".into()],
        device: Some("cpu".into()),
    }]);
}

#[test]
fn load_reports_progress_then_done() {
    let (mut processor, _) = processor(ScriptedEngine::new(["x"]));
    let mut sink = Vec::new();

    processor.process(Request::Load(LoadParams::new("tiny")), &mut sink);

    assert_eq!(sink, vec![Response::status("loading"), Response::Done]);
    assert_eq!(processor.loaded().map(|m| m.model_path.as_str()), Some("tiny"));
}

#[test]
fn failed_load_leaves_nothing_loaded() {
    let (mut processor, _) = loaded(ScriptedEngine::new(["x"]));
    let mut sink = Vec::new();

    processor.process(Request::Load(LoadParams::new("missing")), &mut sink);

    assert_eq!(sink, vec![
        Response::status("loading"),
        Response::error("failed to load model: unknown model missing"),
    ]);
    assert!(processor.loaded().is_none());
}

#[test]
fn engine_load_failure_is_reported() {
    let (mut processor, _) = processor(ScriptedEngine::new(["x"]).failing_load("out of memory"));
    let mut sink = Vec::new();

    processor.process(Request::Load(LoadParams::new("tiny")), &mut sink);

    assert_eq!(Transcript::new(&sink).errors(), vec!["failed to load model: out of memory"]);
}

#[test]
fn unload_always_completes() {
    let (mut processor, _) = loaded(ScriptedEngine::new(["x"]));

    for _ in 0..2 {
        let mut sink = Vec::new();
        processor.process(Request::Unload, &mut sink);
        assert_eq!(sink, vec![Response::status("unloading"), Response::Done]);
        assert!(processor.loaded().is_none());
    }
}

#[test]
fn generate_without_model_fails() {
    let engine = ScriptedEngine::new(["x"]);
    let probe = engine.clone();
    let (mut processor, _) = processor(engine);

    let responses = generate(&mut processor, GenerateParams::new("Once"));

    assert_eq!(responses, vec![Response::error("no model loaded")]);
    assert_eq!(probe.pulled(), 0);
}

#[test]
fn generate_streams_every_fragment() {
    let (mut processor, _) = loaded(ScriptedEngine::new(["Once", " upon", " a time"]));

    let responses = generate(&mut processor, GenerateParams::new("Tell me"));

    check_generation(&responses).unwrap();
    let transcript = Transcript::new(&responses);
    assert_eq!(transcript.statuses(), vec!["generating"]);
    assert_eq!(transcript.streamed(), vec!["Once", " upon", " a time"]);
    assert_eq!(transcript.terminal(), Some(&Response::Done));

    let output = transcript.output().unwrap();
    assert_eq!(output.output, "Once upon a time");
    assert_eq!(output.parameters.prompt, "Tell me");
    assert_eq!(output.model.model_path, "tiny");
    assert!(!output.errored);
}

#[test]
fn generate_respects_token_budget() {
    let engine = ScriptedEngine::new(["a"]).endless();
    let probe = engine.clone();
    let (mut processor, _) = loaded(engine);

    let responses = generate(&mut processor, GenerateParams::new("").with_max_tokens(5));

    check_generation(&responses).unwrap();
    assert_eq!(Transcript::new(&responses).streamed_text(), "aaaaa");
    assert_eq!(probe.pulled(), 5);
}

#[test]
fn line_stop_truncates_and_stops_pulling() {
    let engine = ScriptedEngine::new(["First", " line\nSecond", " line\n", "never"]);
    let probe = engine.clone();
    let (mut processor, _) = loaded(engine);

    let params = GenerateParams::new("").with_stop_condition(StopCondition::Line);
    let responses = generate(&mut processor, params);

    check_generation(&responses).unwrap();
    let transcript = Transcript::new(&responses);
    assert_eq!(transcript.streamed(), vec!["First", " line\n"]);
    assert_eq!(transcript.output().unwrap().output, "First line\n");
    assert_eq!(probe.pulled(), 2);
}

#[test]
fn paragraph_stop_includes_blank_line() {
    let engine = ScriptedEngine::new(["One.\n", "\nTwo.", "\n\nThree."]);
    let (mut processor, _) = loaded(engine);

    let params = GenerateParams::new("").with_stop_condition(StopCondition::Paragraph);
    let responses = generate(&mut processor, params);

    check_generation(&responses).unwrap();
    assert_eq!(Transcript::new(&responses).output().unwrap().output, "One.\n\n");
}

#[test]
fn sentence_stop_completes_prompt_sentence() {
    let engine = ScriptedEngine::new([" the end", ". And", " more."]);
    let (mut processor, _) = loaded(engine);

    let params = GenerateParams::new("Start here. Almost at")
        .with_stop_condition(StopCondition::Sentence);
    let responses = generate(&mut processor, params);

    check_generation(&responses).unwrap();
    assert_eq!(Transcript::new(&responses).output().unwrap().output, " the end.");
}

#[test]
fn abort_observed_between_fragments() {
    let abort = AbortFlag::new();
    let engine = ScriptedEngine::new(["a", "b", "c", "d"]).aborting_after(2, abort.clone());
    let probe = engine.clone();
    let mut processor = Processor::new(Box::new(engine), abort.clone());
    processor.process(Request::Load(LoadParams::new("tiny")), &mut Vec::new());

    let responses = generate(&mut processor, GenerateParams::new(""));

    check_generation(&responses).unwrap();
    let transcript = Transcript::new(&responses);
    assert_eq!(transcript.streamed_text(), "ab");
    assert!(transcript.output().unwrap().errored);
    assert_eq!(transcript.terminal(), Some(&Response::Aborted));
    assert_eq!(probe.pulled(), 2);
    assert!(!abort.is_set());
}

#[test]
fn stop_boundary_wins_over_abort() {
    let abort = AbortFlag::new();
    let engine = ScriptedEngine::new(["done\n", "more"]).aborting_after(1, abort.clone());
    let mut processor = Processor::new(Box::new(engine), abort.clone());
    processor.process(Request::Load(LoadParams::new("tiny")), &mut Vec::new());

    let params = GenerateParams::new("").with_stop_condition(StopCondition::Line);
    let responses = generate(&mut processor, params);

    check_generation(&responses).unwrap();
    assert_eq!(Transcript::new(&responses).terminal(), Some(&Response::Done));
    assert!(!abort.is_set());
}

#[test]
fn engine_failure_discards_partial_output() {
    let (mut processor, abort) = loaded(ScriptedEngine::new(["a", "b", "c"]).failing_at(1));

    let responses = generate(&mut processor, GenerateParams::new(""));

    check_generation(&responses).unwrap();
    let transcript = Transcript::new(&responses);
    assert_eq!(transcript.streamed(), vec!["a"]);
    assert!(transcript.output().is_none());
    assert_eq!(transcript.errors(), vec!["generation failed: scripted failure"]);
    assert!(!abort.is_set());
}

#[test]
fn processor_survives_failures() {
    let (mut processor, _) = loaded(ScriptedEngine::new(["ok"]));

    processor.process(Request::Load(LoadParams::new("missing")), &mut Vec::new());
    assert_eq!(generate(&mut processor, GenerateParams::new("")), vec![Response::error(
        "no model loaded"
    )]);

    processor.process(Request::Load(LoadParams::new("tiny")), &mut Vec::new());
    let responses = generate(&mut processor, GenerateParams::new(""));
    check_generation(&responses).unwrap();
}

#[test]
fn queued_abort_does_not_affect_next_generation() {
    let (mut processor, abort) = loaded(ScriptedEngine::new(["a", "b"]));

    processor.process(Request::Abort, &mut Vec::new());
    let responses = generate(&mut processor, GenerateParams::new(""));

    assert_eq!(Transcript::new(&responses).terminal(), Some(&Response::Done));
    assert!(!abort.is_set());
}

#[test]
fn run_processes_queue_in_order() {
    let engine = ScriptedEngine::new(["hi"]);
    let abort = AbortFlag::new();
    let (requests, mut request_rx) = request_queue(abort.clone());
    let (mut response_tx, mut responses) = response_queue();

    requests.send(Request::Options).unwrap();
    requests.send(Request::Load(LoadParams::new("tiny"))).unwrap();
    requests.send(Request::Generate(GenerateParams::new(""))).unwrap();
    drop(requests);

    Processor::new(Box::new(engine), abort).run(&mut request_rx, &mut response_tx);
    drop(response_tx);

    let mut kinds = Vec::new();
    while let Some(response) = responses.try_recv() {
        kinds.push(response.kind());
    }
    assert_eq!(kinds, vec![
        "options", "status", "done", "status", "stream", "output", "done"
    ]);
}

#[test]
fn run_drains_requests_after_disconnect() {
    let engine = ScriptedEngine::new(["a"]).endless();
    let probe = engine.clone();
    let abort = AbortFlag::new();
    let (requests, mut request_rx) = request_queue(abort.clone());
    let (mut response_tx, responses) = response_queue();

    requests.send(Request::Load(LoadParams::new("tiny"))).unwrap();
    requests.send(Request::Generate(GenerateParams::new(""))).unwrap();
    drop(requests);
    drop(responses);

    Processor::new(Box::new(engine), abort).run(&mut request_rx, &mut response_tx);

    assert_eq!(probe.pulled(), 0);
}

#[test]
fn abort_from_another_thread_stops_generation() {
    let engine = ScriptedEngine::new(["tick "]).endless().with_delay(Duration::from_millis(5));
    let abort = AbortFlag::new();
    let (requests, mut request_rx) = request_queue(abort.clone());
    let (mut response_tx, mut responses) = response_queue();

    let worker = thread::spawn(move || {
        Processor::new(Box::new(engine), abort).run(&mut request_rx, &mut response_tx);
    });

    requests.send(Request::Load(LoadParams::new("tiny"))).unwrap();
    let params = GenerateParams::new("").with_max_tokens(10_000);
    requests.send(Request::Generate(params)).unwrap();

    let mut received = Vec::new();
    while let Some(response) = responses.blocking_recv() {
        let first_stream = matches!(response, Response::Stream { .. })
            && !received.iter().any(|r| matches!(r, Response::Stream { .. }));
        received.push(response);
        if first_stream {
            requests.send(Request::Abort).unwrap();
        }
        if received.iter().filter(|r| r.is_terminal()).count() == 2 {
            break;
        }
    }

    drop(requests);
    worker.join().unwrap();

    let generation = &received[2..];
    check_generation(generation).unwrap();
    assert_eq!(generation.last(), Some(&Response::Aborted));
    assert!(Transcript::new(generation).streamed().len() < 10_000);
}
