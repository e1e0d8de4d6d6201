use rvstruct::ValueStruct;

#[derive(Debug, Clone, PartialEq, Eq, Hash, ValueStruct)]
pub struct DisplayName(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, ValueStruct)]
pub struct PreviewDataUrl(String);

/// Staleness token of the current selection.
///
/// Every selection change produces a new generation. Asynchronous work started
/// for one generation is only allowed to touch the workflow state while that
/// generation is still the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueStruct)]
pub struct SelectionGeneration(u64);

impl SelectionGeneration {
    pub const INITIAL: SelectionGeneration = SelectionGeneration(0);

    pub fn next(self) -> Self {
        SelectionGeneration(self.0.wrapping_add(1))
    }
}
