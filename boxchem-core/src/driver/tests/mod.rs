//! Driver tests covering the step clock, input and output scheduling and
//! the component lifecycle.
