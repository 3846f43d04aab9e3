//! Collapse decoding: argmax per timestep, drop blanks and repeats.

use ndarray::{ArrayView1, ArrayView2};
use thiserror::Error;
use tracing::warn;

use crate::record::ClassifierOutput;
use crate::text::Alphabet;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("probability matrix has {got} classes per step, alphabet has {expected}")]
    ShapeMismatch { expected: usize, got: usize },
}

/// Text recovered for one object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedText {
    pub text: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Default)]
pub struct SequenceDecoder {
    alphabet: Alphabet,
}

impl SequenceDecoder {
    pub fn new(alphabet: Alphabet) -> Self {
        Self { alphabet }
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Decode a `T x N` probability matrix, `N` being the alphabet size.
    ///
    /// A step is skipped when its argmax is the blank or equals the previous
    /// step's argmax, whether or not that previous step was emitted. The
    /// confidence is the mean argmax probability of the emitted steps.
    pub fn decode(&self, probabilities: ArrayView2<'_, f32>) -> Result<DecodedText, DecodeError> {
        let (_, classes) = probabilities.dim();
        if classes != self.alphabet.size() {
            return Err(DecodeError::ShapeMismatch {
                expected: self.alphabet.size(),
                got: classes,
            });
        }

        let steps = probabilities.rows().into_iter().map(argmax);
        let (text, prob_sum, emitted) = self.collapse(steps);
        let confidence = if emitted > 0 {
            prob_sum / emitted as f32
        } else {
            0.0
        };
        Ok(DecodedText { text, confidence })
    }

    /// Apply the collapse rule to an already-resolved argmax sequence.
    pub fn decode_indices(&self, indices: &[usize]) -> String {
        self.collapse(indices.iter().map(|&i| (i, 0.0))).0
    }

    /// Drop blanks and repeats from `(argmax, probability)` steps. Returns
    /// the text, the summed probability of the emitted steps and their count.
    fn collapse(&self, steps: impl Iterator<Item = (usize, f32)>) -> (String, f32, usize) {
        let mut text = String::new();
        let mut prob_sum = 0.0f32;
        let mut emitted = 0usize;
        let mut prev = None;

        for (index, prob) in steps {
            if index != self.alphabet.blank() && prev != Some(index) {
                if let Some(c) = self.alphabet.symbol(index) {
                    text.push(c);
                    prob_sum += prob;
                    emitted += 1;
                }
            }
            prev = Some(index);
        }
        (text, prob_sum, emitted)
    }

    /// Pick the text for an object from its classifier outputs.
    ///
    /// Outputs are visited in order and the first one yielding non-empty
    /// text wins. A resolved label is taken as-is; otherwise the probability
    /// matrix is decoded. With `component` set, outputs from other
    /// components are ignored.
    pub fn resolve(
        &self,
        outputs: &[ClassifierOutput],
        component: Option<i32>,
    ) -> Option<DecodedText> {
        for output in outputs {
            if component.is_some_and(|id| id != output.component_id) {
                continue;
            }
            if let Some(label) = output.label.as_deref().filter(|l| !l.is_empty()) {
                return Some(DecodedText {
                    text: label.to_string(),
                    confidence: output.label_confidence,
                });
            }
            if let Some(probabilities) = &output.probabilities {
                match self.decode(probabilities.view()) {
                    Ok(decoded) if !decoded.text.is_empty() => return Some(decoded),
                    Ok(_) => {}
                    Err(err) => {
                        warn!(component_id = output.component_id, %err, "skipping classifier output");
                    }
                }
            }
        }
        None
    }
}

/// Index and value of the largest entry; ties go to the lowest index and NaN
/// never wins.
fn argmax(row: ArrayView1<'_, f32>) -> (usize, f32) {
    let mut best = (0, f32::NEG_INFINITY);
    for (i, &p) in row.iter().enumerate() {
        if p > best.1 {
            best = (i, p);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn one_hot(indices: &[usize], classes: usize) -> Array2<f32> {
        let mut m = Array2::from_elem((indices.len(), classes), 0.01);
        for (t, &i) in indices.iter().enumerate() {
            m[[t, i]] = 0.9;
        }
        m
    }

    #[test]
    fn test_collapse_repeats_and_blanks() {
        let decoder = SequenceDecoder::default();
        let probs = one_hot(&[1, 1, 36, 2, 2, 36, 3], 37);
        let decoded = decoder.decode(probs.view()).unwrap();
        assert_eq!(decoded.text, "123");
        assert!((decoded.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_blank_separates_repeats() {
        let decoder = SequenceDecoder::default();
        assert_eq!(decoder.decode_indices(&[1, 36, 1]), "11");
        assert_eq!(decoder.decode_indices(&[1, 1, 1]), "1");
        assert_eq!(decoder.decode_indices(&[36, 36]), "");
        assert_eq!(decoder.decode_indices(&[10, 11, 11, 36, 35]), "ABZ");
    }

    #[test]
    fn test_matrix_and_indices_agree() {
        let decoder = SequenceDecoder::default();
        let steps = [5usize, 5, 36, 5, 12, 36, 36, 0];
        let probs = one_hot(&steps, 37);
        let decoded = decoder.decode(probs.view()).unwrap();
        assert_eq!(decoded.text, decoder.decode_indices(&steps));
        assert_eq!(decoded.text, "55C0");
    }

    #[test]
    fn test_length_bounded_by_steps() {
        let decoder = SequenceDecoder::default();
        let indices: Vec<usize> = (0..20).collect();
        let decoded = decoder.decode(one_hot(&indices, 37).view()).unwrap();
        assert_eq!(decoded.text.chars().count(), 20);
    }

    #[test]
    fn test_ties_take_lowest_index() {
        let decoder = SequenceDecoder::default();
        let mut probs = Array2::zeros((1, 37));
        probs[[0, 4]] = 0.5;
        probs[[0, 7]] = 0.5;
        assert_eq!(decoder.decode(probs.view()).unwrap().text, "4");
    }

    #[test]
    fn test_nan_never_wins() {
        let decoder = SequenceDecoder::default();
        let mut probs = Array2::zeros((1, 37));
        probs[[0, 0]] = f32::NAN;
        probs[[0, 5]] = 0.3;
        assert_eq!(decoder.decode(probs.view()).unwrap().text, "5");
    }

    #[test]
    fn test_empty_sequence() {
        let decoder = SequenceDecoder::default();
        let decoded = decoder.decode(Array2::<f32>::zeros((0, 37)).view()).unwrap();
        assert_eq!(decoded, DecodedText::default());
    }

    #[test]
    fn test_shape_mismatch() {
        let decoder = SequenceDecoder::default();
        let err = decoder.decode(Array2::<f32>::zeros((4, 36)).view()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::ShapeMismatch {
                expected: 37,
                got: 36
            }
        );
    }

    #[test]
    fn test_resolve_label_first_wins() {
        let decoder = SequenceDecoder::default();
        let outputs = vec![
            ClassifierOutput::label(2, "51F12345", 0.8),
            ClassifierOutput::label(2, "99Z99999", 0.99),
        ];
        let decoded = decoder.resolve(&outputs, None).unwrap();
        assert_eq!(decoded.text, "51F12345");
        assert_eq!(decoded.confidence, 0.8);
    }

    #[test]
    fn test_resolve_skips_empty_and_other_components() {
        let decoder = SequenceDecoder::default();
        let outputs = vec![
            ClassifierOutput::label(1, "IGNORED", 0.9),
            ClassifierOutput::label(2, "", 0.9),
            ClassifierOutput::probabilities(2, one_hot(&[3, 36, 4], 37)),
        ];
        let decoded = decoder.resolve(&outputs, Some(2)).unwrap();
        assert_eq!(decoded.text, "34");
    }

    #[test]
    fn test_resolve_bad_matrix_falls_through() {
        let decoder = SequenceDecoder::default();
        let outputs = vec![
            ClassifierOutput::probabilities(2, Array2::zeros((3, 10))),
            ClassifierOutput::label(2, "ABC", 0.7),
        ];
        assert_eq!(decoder.resolve(&outputs, None).unwrap().text, "ABC");
    }

    #[test]
    fn test_resolve_nothing() {
        let decoder = SequenceDecoder::default();
        assert!(decoder.resolve(&[], None).is_none());
    }
}
