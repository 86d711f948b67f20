mod common;

use bg_executor::{
    apply_guidance, generate, BatchedExecutor, DefaultSamplingPipeline, ExecutorError,
    Generation, GuidedSampler, SamplingParams, SamplingPipeline, StopReason,
};
use bg_model::StreamingDecoder;
use common::executor;

const STEPS: usize = 24;

async fn guided_run(seed: u64, weight: f32) -> Generation {
    let exec = executor();
    let guided = exec.prompt("A happy story about").unwrap();
    let guidance = exec.prompt("A story about").unwrap();
    exec.infer().await.unwrap();

    let mut sampler = GuidedSampler::new(
        Some(&guidance),
        weight,
        SamplingParams::default().with_seed(seed),
    );
    generate(&exec, &guided, &[&guidance], &mut sampler, STEPS)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_guided_loop_is_deterministic() {
    let a = guided_run(1234, 2.0).await;
    let b = guided_run(1234, 2.0).await;
    assert_eq!(a, b);
    assert!(a.tokens.len() <= STEPS);
    if a.stop_reason == StopReason::MaxSteps {
        assert_eq!(a.tokens.len(), STEPS);
    }
}

#[tokio::test]
async fn test_guided_and_guidance_stay_in_lock_step() {
    let exec = executor();
    let guided = exec.prompt("positive").unwrap();
    let guidance = exec.prompt("neutral").unwrap();
    exec.infer().await.unwrap();
    let guided_start = guided.token_count().unwrap();
    let guidance_start = guidance.token_count().unwrap();

    let mut sampler = GuidedSampler::new(Some(&guidance), 1.5, SamplingParams::default());
    let out = generate(&exec, &guided, &[&guidance], &mut sampler, 8)
        .await
        .unwrap();

    let n = out.tokens.len();
    assert_eq!(guided.tokens().unwrap()[guided_start..], out.tokens[..]);
    assert_eq!(guidance.tokens().unwrap()[guidance_start..], out.tokens[..]);
    assert_eq!(guided.token_count().unwrap(), guided_start + n);
}

#[tokio::test]
async fn test_zero_weight_matches_unguided() {
    let exec = executor();
    let guided = exec.prompt("A").unwrap();
    let guidance = exec.prompt("B").unwrap();
    exec.infer().await.unwrap();
    let unguided = guided.fork().unwrap();

    let params = SamplingParams::default().with_seed(99);
    let mut zero = GuidedSampler::new(Some(&guidance), 0.0, params.clone());
    let with_zero = generate(&exec, &guided, &[&guidance], &mut zero, 12)
        .await
        .unwrap();

    let mut plain = DefaultSamplingPipeline::new(params);
    let without = generate(&exec, &unguided, &[], &mut plain, 12)
        .await
        .unwrap();

    assert_eq!(with_zero, without);
}

#[tokio::test]
async fn test_guided_logits_follow_formula() {
    let exec = executor();
    let guided = exec.prompt("left").unwrap();
    let guidance = exec.prompt("right").unwrap();
    exec.infer().await.unwrap();

    let ctx = exec.sampling_context();
    let primary = guided.sample().unwrap();
    let negative = guidance.sample().unwrap();

    let mut processed = primary.to_vec();
    let mut sampler = GuidedSampler::new(Some(&guidance), 3.0, SamplingParams::default());
    sampler.process_logits(&ctx, &mut processed, &[]).unwrap();

    for i in 0..ctx.vocab_size {
        let expected = primary[i] + 3.0 * (primary[i] - negative[i]);
        approx::assert_relative_eq!(processed[i], expected, epsilon = 1e-5);
    }

    let mut manual = primary.to_vec();
    apply_guidance(&mut manual, &negative, 3.0).unwrap();
    assert_eq!(manual, processed);
}

#[tokio::test]
async fn test_stale_guidance_fails() {
    let exec = executor();
    let guided = exec.prompt("a").unwrap();
    let guidance = exec.prompt("b").unwrap();
    exec.infer().await.unwrap();
    guidance.prompt_token(7).unwrap();

    let ctx = exec.sampling_context();
    let mut sampler = GuidedSampler::new(Some(&guidance), 1.0, SamplingParams::default());
    let err = guided.sample_with(&mut sampler, &[]).unwrap_err();
    assert!(matches!(err, ExecutorError::StaleState(id) if id == guidance.id()));

    // A zero weight never reads the guidance conversation.
    sampler.set_weight(0.0);
    let token = guided.sample_with(&mut sampler, &[]).unwrap();
    assert!((token as usize) < ctx.vocab_size);
}

#[tokio::test]
async fn test_disposed_guidance_fails() {
    let exec = executor();
    let guided = exec.prompt("a").unwrap();
    let mut guidance = exec.prompt("b").unwrap();
    exec.infer().await.unwrap();
    guidance.dispose().unwrap();

    let mut sampler = GuidedSampler::new(Some(&guidance), 1.0, SamplingParams::default());
    assert!(matches!(
        guided.sample_with(&mut sampler, &[]),
        Err(ExecutorError::UseAfterDispose)
    ));
}

#[test]
fn test_guided_sampler_cannot_clone() {
    let sampler = GuidedSampler::new(None, 1.0, SamplingParams::default());
    assert!(matches!(
        sampler.try_clone(),
        Err(ExecutorError::UnsupportedOperation(_))
    ));
    assert!(DefaultSamplingPipeline::default().try_clone().is_ok());
}

#[tokio::test]
async fn test_greedy_generation_stops_at_max_steps_or_eos() {
    let exec = executor();
    let conv = exec.prompt("x").unwrap();
    let mut greedy = DefaultSamplingPipeline::new(SamplingParams::default().with_temperature(0.0));
    let out = generate(&exec, &conv, &[], &mut greedy, 5).await.unwrap();

    match out.stop_reason {
        StopReason::MaxSteps => assert_eq!(out.tokens.len(), 5),
        StopReason::EndOfSequence => assert!(out.tokens.len() < 5),
    }
    assert!(!out.tokens.contains(&exec.eos_token()));
}

#[tokio::test]
async fn test_zero_steps() {
    let exec = executor();
    let conv = exec.prompt("x").unwrap();
    let mut pipeline = DefaultSamplingPipeline::default();
    let out = generate(&exec, &conv, &[], &mut pipeline, 0).await.unwrap();
    assert!(out.tokens.is_empty());
    assert_eq!(out.stop_reason, StopReason::MaxSteps);
    assert!(conv.requires_inference().unwrap());
}

#[tokio::test]
async fn test_streaming_decode_of_generation() {
    let exec: BatchedExecutor = executor();
    let out = guided_run(5, 1.0).await;

    let tokenizer = exec.tokenizer();
    let mut decoder = StreamingDecoder::new(tokenizer.clone());
    let mut text = String::new();
    for &token in &out.tokens {
        decoder.add(token);
        text.push_str(&decoder.read());
    }
    text.push_str(&decoder.flush());

    assert_eq!(decoder.tokens(), out.tokens.as_slice());
    assert_eq!(text, tokenizer.decode(&out.tokens));
}
