use rand::Rng;

/// Turn unnormalised log-weights into probabilities via log-sum-exp.
///
/// Subtracting the maximum before exponentiating keeps every term in
/// `(0, 1]`, so products that would over- or underflow as raw `f64` still
/// normalise correctly.
pub fn normalize_log_weights(log_weights: &[f64]) -> Vec<f64> {
	if log_weights.is_empty() {
		return Vec::new();
	}
	let max = log_weights
		.iter()
		.copied()
		.fold(f64::NEG_INFINITY, f64::max);
	if !max.is_finite() {
		// Every option is impossible (or the input is degenerate); fall back
		// to a uniform distribution rather than producing NaNs.
		let uniform = 1.0 / log_weights.len() as f64;
		return vec![uniform; log_weights.len()];
	}
	let exps: Vec<f64> = log_weights.iter().map(|&w| (w - max).exp()).collect();
	let sum: f64 = exps.iter().sum();
	exps.iter().map(|&e| e / sum).collect()
}

/// Draw an index from a categorical distribution.
pub fn sample_categorical<R: Rng + ?Sized>(probs: &[f64], rng: &mut R) -> usize {
	let random: f64 = rng.random::<f64>();

	let mut cumulative = 0.0f64;
	for (i, &prob) in probs.iter().enumerate() {
		cumulative += prob;
		if random < cumulative {
			return i;
		}
	}

	// Rounding left the cumulative sum just short of 1.0; never land on an
	// impossible outcome.
	probs
		.iter()
		.rposition(|&prob| prob > 0.0)
		.unwrap_or_else(|| probs.len().saturating_sub(1))
}

/// Index of the largest probability; the lowest index wins ties.
pub fn argmax(probs: &[f64]) -> usize {
	let mut best = 0;
	for (i, &prob) in probs.iter().enumerate().skip(1) {
		if prob > probs[best] {
			best = i;
		}
	}
	best
}
