//! Operation identity — opcodes and lookup keys.
//!
//! Every operation inside a component is identified by an [`OperationKey`]:
//! the opcode, an optional name, and an optional disambiguation tag. The key
//! is the unit of lookup and deduplication during graph construction.

use serde::{Deserialize, Serialize};

/// What kind of evaluation step an operation performs.
///
/// The numeric value is stable and appears in diagnostic identifiers; it is
/// never used for equality beyond plain enum comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum OperationCode {
    /// Generic operation with no dedicated code.
    Operation = 0,

    /// Evaluate entity-level parameters.
    ParametersEval = 1,

    /// Animation component entry point.
    AnimationEntry = 10,
    /// Evaluate animation curves for the current frame.
    AnimationEval = 11,
    /// Animation component exit point.
    AnimationExit = 12,

    /// Initialise transform evaluation.
    TransformInit = 20,
    /// Evaluate the local transform channels.
    TransformLocal = 21,
    /// Apply the parent transform.
    TransformParent = 22,
    /// Produce the final world-space transform.
    TransformFinal = 23,

    /// Prepare geometry for evaluation.
    GeometryInit = 30,
    /// Evaluate the geometry (modifiers, derived data).
    GeometryEval = 31,
    /// Finish geometry evaluation and publish results.
    GeometryDone = 32,

    /// Initialise pose evaluation.
    PoseInit = 40,
    /// Finish pose evaluation.
    PoseDone = 41,

    /// Evaluate a bone's local channels.
    BoneLocal = 50,
    /// Bone is ready for constraint evaluation.
    BoneReady = 51,
    /// Bone evaluation complete.
    BoneDone = 52,
}

impl OperationCode {
    /// The stable numeric value used in diagnostic identifiers.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// A short lowercase name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Operation => "operation",
            Self::ParametersEval => "parameters_eval",
            Self::AnimationEntry => "animation_entry",
            Self::AnimationEval => "animation_eval",
            Self::AnimationExit => "animation_exit",
            Self::TransformInit => "transform_init",
            Self::TransformLocal => "transform_local",
            Self::TransformParent => "transform_parent",
            Self::TransformFinal => "transform_final",
            Self::GeometryInit => "geometry_init",
            Self::GeometryEval => "geometry_eval",
            Self::GeometryDone => "geometry_done",
            Self::PoseInit => "pose_init",
            Self::PoseDone => "pose_done",
            Self::BoneLocal => "bone_local",
            Self::BoneReady => "bone_ready",
            Self::BoneDone => "bone_done",
        }
    }
}

impl std::fmt::Display for OperationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The unique identity of an operation within one component.
///
/// Two keys are equal iff opcode, name content, and name tag all match.
/// The derived `Hash` feeds the fields in declaration order — opcode, then
/// name content, then tag — so semantically-equal keys always hash
/// identically regardless of how their strings were produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationKey {
    /// What the operation does.
    pub opcode: OperationCode,
    /// Distinguishes same-opcode operations (e.g. one per bone). Empty for
    /// the common single-operation case.
    pub name: String,
    /// Secondary disambiguator for same-opcode, same-name operations.
    pub name_tag: i32,
}

impl OperationKey {
    /// Sentinel meaning "no disambiguation tag".
    pub const NO_NAME_TAG: i32 = -1;

    /// Key for "the" operation of an opcode — empty name, no tag.
    #[must_use]
    pub fn from_opcode(opcode: OperationCode) -> Self {
        Self {
            opcode,
            name: String::new(),
            name_tag: Self::NO_NAME_TAG,
        }
    }

    /// Fully-qualified key for components with several same-opcode
    /// operations.
    #[must_use]
    pub fn new(opcode: OperationCode, name: impl Into<String>, name_tag: i32) -> Self {
        Self {
            opcode,
            name: name.into(),
            name_tag,
        }
    }

    /// Human-readable identifier for diagnostics: the opcode's numeric value
    /// plus the name. Not used in equality.
    #[must_use]
    pub fn identifier(&self) -> String {
        format!("({}, \"{}\")", self.opcode.as_u16(), self.name)
    }
}

impl std::fmt::Display for OperationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name_tag == Self::NO_NAME_TAG {
            write!(f, "{}({})", self.opcode, self.name)
        } else {
            write!(f, "{}({}:{})", self.opcode, self.name, self.name_tag)
        }
    }
}
