//! Partitioned Convolution Integration Tests
//!
//! Streams audio through the engine block by block and checks it against a
//! direct time-domain convolution.
//! Verifies:
//! - Exact alignment of every partition's delay
//! - Variable block lengths and ring wraparound
//! - Thread-count invariance
//! - Reset and end-of-stream draining

use partconv_core::Sample;
use partconv_dsp::{ConvolverConfig, PartitionedConvolver, Processor};

const TOLERANCE: f64 = 1e-9;

/// Block lengths cycled through by the streaming tests (all <= 8)
const BLOCK_PATTERN: &[usize] = &[8, 3, 8, 1, 5, 8, 7, 2];

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config(block_size: usize, max_threads: usize) -> ConvolverConfig {
    ConvolverConfig {
        block_size,
        max_threads,
    }
}

/// Deterministic white noise in [-1, 1]
fn generate_noise(samples: usize, seed: u64) -> Vec<Sample> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    (0..samples)
        .map(|i| {
            let mut hasher = DefaultHasher::new();
            (seed, i).hash(&mut hasher);
            let h = hasher.finish();
            (h as f64 / u64::MAX as f64) * 2.0 - 1.0
        })
        .collect()
}

/// Reference linear convolution, full length
fn direct_convolution(input: &[Sample], ir: &[Sample]) -> Vec<Sample> {
    let mut out = vec![0.0; input.len() + ir.len() - 1];
    for (i, &x) in input.iter().enumerate() {
        for (j, &h) in ir.iter().enumerate() {
            out[i + j] += x * h;
        }
    }
    out
}

/// Push `input` using the block pattern, then drain with `flush`
fn stream(conv: &mut PartitionedConvolver, input: &[Sample], pattern: &[usize]) -> Vec<Sample> {
    let mut output = Vec::with_capacity(input.len() + conv.ir_length());
    let mut pos = 0;
    let mut k = 0;

    while pos < input.len() {
        let len = pattern[k % pattern.len()].min(input.len() - pos);
        let mut block = input[pos..pos + len].to_vec();
        assert_eq!(conv.push_block(&mut block, len), len);
        output.extend_from_slice(&block);
        pos += len;
        k += 1;
    }

    let mut block = vec![0.0; conv.block_len()];
    loop {
        let n = conv.flush(&mut block);
        if n == 0 {
            break;
        }
        output.extend_from_slice(&block[..n]);
    }
    output
}

fn assert_close(actual: &[Sample], expected: &[Sample]) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < TOLERANCE, "sample {i}: got {a}, expected {e}");
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REFERENCE SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_pure_delay_partitions() {
    init_logging();

    let ir = [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0,
    ];
    let mut conv = PartitionedConvolver::from_samples(&ir, &config(4, 2)).unwrap();
    assert_eq!(conv.partition_count(), 3);

    let inputs = [[1.0, 2.0, 3.0, 4.0], [0.0; 4], [0.0; 4], [0.0; 4]];
    let expected = [
        [1.0, 2.0, 3.0, 4.0],
        [0.0, 1.0, 2.0, 3.0],
        [4.0, 0.0, 1.0, 2.0],
        [3.0, 4.0, 0.0, 0.0],
    ];

    for (input, want) in inputs.iter().zip(&expected) {
        let mut block = *input;
        assert_eq!(conv.push_block(&mut block, 4), 4);
        assert_close(&block, want);
    }
}

#[test]
fn test_moving_average_single_partition() {
    init_logging();

    let mut conv = PartitionedConvolver::from_samples(&[0.5, 0.5], &config(4, 2)).unwrap();
    assert_eq!(conv.partition_count(), 1);

    let mut block = [1.0; 4];
    assert_eq!(conv.push_block(&mut block, 4), 4);
    assert_close(&block, &[0.5, 1.0, 1.0, 1.0]);

    let mut tail = [0.0; 4];
    assert_eq!(conv.flush(&mut tail), 1);
    assert_close(&tail[..1], &[0.5]);
    assert_eq!(conv.flush(&mut tail), 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// STREAMING ACCURACY
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_matches_direct_convolution_with_full_blocks() {
    init_logging();

    let ir = generate_noise(37, 1);
    let input = generate_noise(256, 2);
    let mut conv = PartitionedConvolver::from_samples(&ir, &config(8, 2)).unwrap();

    let output = stream(&mut conv, &input, &[8]);
    assert_close(&output, &direct_convolution(&input, &ir));
}

#[test]
fn test_matches_direct_convolution_with_variable_blocks() {
    init_logging();

    let ir = generate_noise(37, 3);
    // Long enough to wrap the ring many times
    let input = generate_noise(613, 4);

    for threads in 0..=3 {
        let mut conv = PartitionedConvolver::from_samples(&ir, &config(8, threads)).unwrap();
        let output = stream(&mut conv, &input, BLOCK_PATTERN);
        assert_close(&output, &direct_convolution(&input, &ir));
    }
}

#[test]
fn test_ir_exact_multiple_of_block() {
    init_logging();

    let ir = generate_noise(64, 5);
    let input = generate_noise(300, 6);
    let mut conv = PartitionedConvolver::from_samples(&ir, &config(16, 3)).unwrap();
    assert_eq!(conv.partition_count(), 4);

    let output = stream(&mut conv, &input, &[16, 16, 9, 16, 4]);
    assert_close(&output, &direct_convolution(&input, &ir));
}

#[test]
fn test_thread_count_does_not_change_output() {
    init_logging();

    let ir = generate_noise(200, 7);
    let input = generate_noise(500, 8);

    let reference = {
        let mut conv = PartitionedConvolver::from_samples(&ir, &config(8, 0)).unwrap();
        stream(&mut conv, &input, BLOCK_PATTERN)
    };

    for threads in [1, 2, 4, 64] {
        let mut conv = PartitionedConvolver::from_samples(&ir, &config(8, threads)).unwrap();
        let output = stream(&mut conv, &input, BLOCK_PATTERN);
        assert_eq!(output, reference, "max_threads = {threads}");
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTRACT AND LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_oversized_block_is_rejected_without_side_effects() {
    init_logging();

    let ir = generate_noise(20, 9);
    let input = generate_noise(64, 10);

    let mut clean = PartitionedConvolver::from_samples(&ir, &config(8, 2)).unwrap();
    let mut probed = PartitionedConvolver::from_samples(&ir, &config(8, 2)).unwrap();

    let mut expected = Vec::new();
    let mut actual = Vec::new();
    for chunk in input.chunks(8) {
        let mut a = chunk.to_vec();
        clean.push_block(&mut a, chunk.len());
        expected.extend(a);

        let mut bogus = vec![1.0; 9];
        let position = probed.write_position();
        assert_eq!(probed.push_block(&mut bogus, 9), 0);
        assert_eq!(probed.write_position(), position);
        assert!(bogus.iter().all(|&x| x == 1.0));

        let mut b = chunk.to_vec();
        probed.push_block(&mut b, chunk.len());
        actual.extend(b);
    }

    assert_eq!(actual, expected);
}

#[test]
fn test_reset_leaves_no_residual_energy() {
    init_logging();

    let ir = generate_noise(100, 11);
    let input = generate_noise(77, 12);

    for threads in [0, 2] {
        let mut conv = PartitionedConvolver::from_samples(&ir, &config(8, threads)).unwrap();
        for chunk in input.chunks(8) {
            let mut block = chunk.to_vec();
            conv.push_block(&mut block, chunk.len());
        }

        // Workers of the last block are still in flight here.
        conv.reset();
        assert_eq!(conv.write_position(), 0);

        for _ in 0..40 {
            let mut block = [0.0; 8];
            assert_eq!(conv.push_block(&mut block, 8), 8);
            assert!(block.iter().all(|&x| x == 0.0), "threads = {threads}");
        }

        let mut drain = [1.0; 8];
        assert_eq!(conv.flush(&mut drain), 8);
    }
}

#[test]
fn test_reset_then_new_stream_is_exact() {
    init_logging();

    let ir = generate_noise(45, 13);
    let first = generate_noise(90, 14);
    let second = generate_noise(150, 15);

    let mut conv = PartitionedConvolver::from_samples(&ir, &config(8, 2)).unwrap();
    let _ = stream(&mut conv, &first[..50], BLOCK_PATTERN);
    conv.reset();

    let output = stream(&mut conv, &second, BLOCK_PATTERN);
    assert_close(&output, &direct_convolution(&second, &ir));
}

#[test]
fn test_flush_without_input_is_empty() {
    init_logging();

    let mut conv = PartitionedConvolver::from_samples(&[1.0; 10], &config(4, 1)).unwrap();
    let mut block = [0.0; 4];
    assert_eq!(conv.flush(&mut block), 0);
    assert_eq!(conv.flush(&mut []), 0);
}

#[test]
fn test_ring_always_covers_ir_reach() {
    for (ir_len, block) in [(1, 4), (4, 4), (5, 4), (1000, 64), (4097, 512)] {
        let conv = PartitionedConvolver::from_samples(&vec![0.1; ir_len], &config(block, 2)).unwrap();
        let reach = conv.partition_count() * conv.block_len();
        assert!(conv.ring_capacity() >= 2 * reach);
        assert!(reach >= ir_len);
    }
}
