//! A recurrent chord model built from four gates.
//!
//! The composer carries a context row from one chord to the next. Each step
//! it reads `[infos, context]` to guess the next chord, then folds the chord
//! into the context in the manner of an LSTM cell:
//!
//! ```text
//! x       = [infos, context, chord]
//! context = context * forget(x) + input(x) * remember(x)
//! ```

use crate::activator::Activator;
use crate::error::{Error, Result};
use crate::evaluate::SequenceModel;
use crate::gate::Gate;
use crate::matrix::{self, Mat};
use crate::search::Perturb;
use crate::utils::ZeroOut;

use rand::Rng;
use serde_derive::{Deserialize, Serialize};

/// Dimensions of a `Composer`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposerShape {
    /// Width of the per-sequence header row.
    pub infos_len: usize,
    /// Width of every chord.
    pub chord_len: usize,
    /// Width of the carried context.
    pub context_len: usize,
    /// Hidden layers in each gate, interpolated between its input and output
    /// widths.
    pub hidden_layers: usize,
}

impl ComposerShape {
    /// A shape with a 150-wide context and two hidden layers per gate.
    pub fn new(infos_len: usize, chord_len: usize) -> Self {
        ComposerShape {
            infos_len,
            chord_len,
            context_len: 150,
            hidden_layers: 2,
        }
    }

    pub fn context_len(mut self, context_len: usize) -> Self {
        self.context_len = context_len;
        self
    }

    pub fn hidden_layers(mut self, hidden_layers: usize) -> Self {
        self.hidden_layers = hidden_layers;
        self
    }

    fn note_input_len(&self) -> usize {
        self.infos_len + self.context_len
    }

    fn context_input_len(&self) -> usize {
        self.note_input_len() + self.chord_len
    }
}

/// A stateful chord sequence model.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawComposer")]
pub struct Composer {
    shape: ComposerShape,
    /// Guesses the next chord from `[infos, context]`.
    output_gate: Gate,
    /// Scales down the old context.
    forget_gate: Gate,
    /// Scales the candidate context.
    input_gate: Gate,
    /// Proposes the candidate context.
    remember_gate: Gate,
    infos: Mat,
    context: Mat,
}

impl Composer {
    /// Creates a composer with freshly initialized gates drawn from the
    /// thread-local random source.
    pub fn new(shape: ComposerShape) -> Result<Self> {
        Composer::new_with_rng(&mut rand::thread_rng(), shape)
    }

    /// Like `new`, drawing the initial weights from `rng`.
    pub fn new_with_rng<R: Rng + ?Sized>(rng: &mut R, shape: ComposerShape) -> Result<Self> {
        let note_in = shape.note_input_len();
        let context_in = shape.context_input_len();
        let (chords, context, hidden) = (shape.chord_len, shape.context_len, shape.hidden_layers);
        Ok(Composer {
            shape,
            output_gate: Gate::auto_with_rng(rng, Activator::Sigmoid, note_in, chords, hidden)?,
            forget_gate: Gate::auto_with_rng(rng, Activator::Sigmoid, context_in, context, hidden)?,
            input_gate: Gate::auto_with_rng(rng, Activator::Sigmoid, context_in, context, hidden)?,
            remember_gate: Gate::auto_with_rng(rng, Activator::TanH, context_in, context, hidden)?,
            infos: Mat::zeros((1, shape.infos_len)),
            context: Mat::zeros((1, shape.context_len)),
        })
    }

    pub fn shape(&self) -> ComposerShape {
        self.shape
    }

    /// The carried context row.
    pub fn context(&self) -> &Mat {
        &self.context
    }

    /// Total weight count over the four gates.
    pub fn neuron_count(&self) -> usize {
        self.gates().iter().map(|g| g.neuron_count()).sum()
    }

    fn gates(&self) -> [&Gate; 4] {
        [
            &self.output_gate,
            &self.forget_gate,
            &self.input_gate,
            &self.remember_gate,
        ]
    }

    /// Replaces this composer's gates and state with `other`'s.
    pub fn adopt(&mut self, other: Composer) {
        *self = other;
    }

    /// Guesses the next chord and folds the guess into the context.
    pub fn predict_next(&mut self) -> Result<Mat> {
        let chord = self.predict()?;
        self.update_context(&chord)?;
        Ok(chord)
    }

    /// Starts a new piece, primes it with `primer`, then composes `count`
    /// chords, each fed back as the next step's input.
    pub fn generate(&mut self, infos: &Mat, primer: &[Mat], count: usize) -> Result<Vec<Mat>> {
        self.start(infos)?;
        for chord in primer {
            self.observe(chord)?;
        }
        (0..count).map(|_| self.predict_next()).collect()
    }

    fn update_context(&mut self, chord: &Mat) -> Result<()> {
        let x = matrix::concat_rows(&[&self.infos, &self.context, chord])?;
        let forget = self.forget_gate.compute(&x)?;
        let remember = self.input_gate.compute(&x)? * &self.remember_gate.compute(&x)?;
        self.context *= &forget;
        self.context += &remember;
        Ok(())
    }
}

impl SequenceModel for Composer {
    fn start(&mut self, infos: &Mat) -> Result<()> {
        matrix::expect_row(infos, self.shape.infos_len, "composer infos")?;
        self.infos.assign(infos);
        self.context.zero_out();
        Ok(())
    }

    fn observe(&mut self, chord: &Mat) -> Result<()> {
        matrix::expect_row(chord, self.shape.chord_len, "composer chord")?;
        self.update_context(chord)
    }

    fn predict(&self) -> Result<Mat> {
        let x = matrix::concat_rows(&[&self.infos, &self.context])?;
        self.output_gate.compute(&x)
    }
}

impl Perturb for Composer {
    /// Perturbs all four gates from the same stream. The carried state is
    /// copied as is.
    fn perturb<R: Rng + ?Sized>(&self, rng: &mut R, magnitude: f64) -> Self {
        Composer {
            shape: self.shape,
            output_gate: self.output_gate.perturbed_with(rng, magnitude),
            forget_gate: self.forget_gate.perturbed_with(rng, magnitude),
            input_gate: self.input_gate.perturbed_with(rng, magnitude),
            remember_gate: self.remember_gate.perturbed_with(rng, magnitude),
            infos: self.infos.clone(),
            context: self.context.clone(),
        }
    }
}

impl TryFrom<[Gate; 4]> for Composer {
    type Error = Error;

    /// Assembles a composer from `[output, forget, input, remember]` gates,
    /// checking that their widths line up.
    fn try_from(gates: [Gate; 4]) -> Result<Self> {
        let [output_gate, forget_gate, input_gate, remember_gate] = gates;
        let chord_len = output_gate.output_len();
        let context_len = forget_gate.output_len();
        let note_in = output_gate.input_len();
        if note_in < context_len {
            return Err(Error::Dimension {
                context: "output gate",
                expected: format!("at least {} inputs", context_len),
                found: format!("{} inputs", note_in),
            });
        }
        let shape = ComposerShape {
            infos_len: note_in - context_len,
            chord_len,
            context_len,
            hidden_layers: output_gate.layer_count() - 1,
        };
        for gate in [&forget_gate, &input_gate, &remember_gate] {
            if gate.input_len() != shape.context_input_len() || gate.output_len() != context_len {
                return Err(Error::Dimension {
                    context: "context gate",
                    expected: format!("{} -> {}", shape.context_input_len(), context_len),
                    found: format!("{} -> {}", gate.input_len(), gate.output_len()),
                });
            }
            if gate.layer_count() != output_gate.layer_count() {
                return Err(Error::Dimension {
                    context: "context gate",
                    expected: format!("{} layers", output_gate.layer_count()),
                    found: format!("{} layers", gate.layer_count()),
                });
            }
        }
        Ok(Composer {
            shape,
            output_gate,
            forget_gate,
            input_gate,
            remember_gate,
            infos: Mat::zeros((1, shape.infos_len)),
            context: Mat::zeros((1, context_len)),
        })
    }
}

/// A composer as stored, before its gates and state are checked.
#[derive(Deserialize)]
struct RawComposer {
    shape: ComposerShape,
    output_gate: Gate,
    forget_gate: Gate,
    input_gate: Gate,
    remember_gate: Gate,
    infos: Mat,
    context: Mat,
}

impl TryFrom<RawComposer> for Composer {
    type Error = Error;

    fn try_from(raw: RawComposer) -> Result<Self> {
        let mut composer = Composer::try_from([
            raw.output_gate,
            raw.forget_gate,
            raw.input_gate,
            raw.remember_gate,
        ])?;
        if composer.shape != raw.shape {
            return Err(Error::Dimension {
                context: "composer shape",
                expected: format!("{:?}", composer.shape),
                found: format!("{:?}", raw.shape),
            });
        }
        matrix::expect_row(&raw.infos, raw.shape.infos_len, "composer infos")?;
        matrix::expect_row(&raw.context, raw.shape.context_len, "composer context")?;
        composer.infos = raw.infos;
        composer.context = raw.context;
        Ok(composer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate;
    use crate::sequence::ChordSequence;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn shape() -> ComposerShape {
        ComposerShape::new(2, 4).context_len(3).hidden_layers(1)
    }

    fn composer(seed: u64) -> Composer {
        Composer::new_with_rng(&mut StdRng::seed_from_u64(seed), shape()).unwrap()
    }

    fn piece() -> ChordSequence {
        ChordSequence::from_rows(
            &[0.5, 0.25],
            &[
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
                [1.0, 0.0, 0.0, 0.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn gate_shapes() {
        let c = composer(1);
        assert_eq!(c.output_gate.input_len(), 5);
        assert_eq!(c.output_gate.output_len(), 4);
        for gate in [&c.forget_gate, &c.input_gate, &c.remember_gate] {
            assert_eq!(gate.input_len(), 9);
            assert_eq!(gate.output_len(), 3);
            assert_eq!(gate.layer_count(), 2);
        }
        assert_eq!(c.remember_gate.activator(), Activator::TanH);
        assert_eq!(
            c.neuron_count(),
            c.gates().iter().map(|g| g.neuron_count()).sum::<usize>()
        );
    }

    #[test]
    fn start_resets_context() {
        let mut c = composer(2);
        let seq = piece();
        c.start(seq.infos()).unwrap();
        c.observe(&seq.chords()[0]).unwrap();
        assert!(c.context().iter().any(|&v| v != 0.0));
        c.start(seq.infos()).unwrap();
        assert!(c.context().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn rejects_bad_widths() {
        let mut c = composer(3);
        assert!(c.start(&matrix::row(&[1.0])).is_err());
        assert!(c.observe(&matrix::row(&[1.0, 0.0])).is_err());
        assert!(Composer::new(ComposerShape::new(2, 0)).is_err());
    }

    #[test]
    fn prediction_leaves_state_alone() {
        let mut c = composer(4);
        c.start(piece().infos()).unwrap();
        let first = c.predict().unwrap();
        assert_eq!(c.predict().unwrap(), first);
        assert_eq!(first.dim(), (1, 4));
        assert!(first.iter().all(|&v| v > 0.0 && v < 1.0));

        let guessed = c.predict_next().unwrap();
        assert_eq!(guessed, first);
        assert!(c.context().iter().any(|&v| v != 0.0));
    }

    #[test]
    fn generation_is_deterministic() {
        let seq = piece();
        let mut a = composer(5);
        let mut b = a.clone();
        let primer = &seq.chords()[..2];
        let out_a = a.generate(seq.infos(), primer, 3).unwrap();
        let out_b = b.generate(seq.infos(), primer, 3).unwrap();
        assert_eq!(out_a.len(), 3);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn evaluation_is_repeatable() {
        let seq = piece();
        let mut c = composer(6);
        let first = evaluate::error_sum(&mut c, &seq, 1).unwrap();
        let second = evaluate::error_sum(&mut c, &seq, 1).unwrap();
        assert!(first > 0.0);
        assert_eq!(first, second);
        assert_eq!(evaluate::error_sum(&mut c, &seq, seq.len()).unwrap(), 0.0);
    }

    #[test]
    fn zero_perturbation_keeps_error() {
        let seq = piece();
        let mut c = composer(7);
        let mut clone = c.perturb(&mut StdRng::seed_from_u64(1), 0.0);
        assert_eq!(
            evaluate::error_sum(&mut c, &seq, 0).unwrap(),
            evaluate::error_sum(&mut clone, &seq, 0).unwrap()
        );
        let moved = c.perturb(&mut StdRng::seed_from_u64(1), 0.5);
        assert_ne!(moved.output_gate.weights(), c.output_gate.weights());
    }

    #[test]
    fn adopt_takes_everything() {
        let mut a = composer(8);
        let b = composer(9);
        let weights = b.output_gate.weights().to_vec();
        a.adopt(b);
        assert_eq!(a.output_gate.weights(), &weights[..]);
    }

    #[test]
    fn assembles_from_gates() {
        let c = composer(10);
        let rebuilt = Composer::try_from([
            c.output_gate.clone(),
            c.forget_gate.clone(),
            c.input_gate.clone(),
            c.remember_gate.clone(),
        ])
        .unwrap();
        assert_eq!(rebuilt.shape(), c.shape());

        let mismatched = Composer::try_from([
            c.output_gate.clone(),
            c.forget_gate.clone(),
            c.output_gate.clone(),
            c.remember_gate.clone(),
        ]);
        assert!(mismatched.is_err());
    }

    #[test]
    fn gates_must_share_a_depth() {
        let c = composer(11);
        let shallow = Gate::auto_with_rng(&mut StdRng::seed_from_u64(1), Activator::Sigmoid, 9, 3, 0).unwrap();
        let mixed = Composer::try_from([
            c.output_gate.clone(),
            shallow,
            c.input_gate.clone(),
            c.remember_gate.clone(),
        ]);
        assert!(matches!(mixed, Err(Error::Dimension { .. })));
    }

    #[test]
    fn reloads_with_state() {
        let seq = piece();
        let mut c = composer(12);
        c.start(seq.infos()).unwrap();
        c.observe(&seq.chords()[0]).unwrap();

        let json = serde_json::to_string(&c).unwrap();
        let back: Composer = serde_json::from_str(&json).unwrap();
        assert_eq!(back.shape(), c.shape());
        assert_eq!(back.context(), c.context());
        assert_eq!(back.predict().unwrap(), c.predict().unwrap());
    }

    #[test]
    fn reload_checks_shape_and_state() {
        let c = composer(13);
        let value = serde_json::to_value(&c).unwrap();

        let mut wrong_shape = value.clone();
        wrong_shape["shape"]["context_len"] = serde_json::json!(4);
        assert!(serde_json::from_value::<Composer>(wrong_shape).is_err());

        let mut wrong_context = value.clone();
        wrong_context["context"] = serde_json::to_value(Mat::zeros((1, 2))).unwrap();
        assert!(serde_json::from_value::<Composer>(wrong_context).is_err());

        let mut wrong_gate = value;
        wrong_gate["forget_gate"] = wrong_gate["output_gate"].clone();
        assert!(serde_json::from_value::<Composer>(wrong_gate).is_err());
    }
}
