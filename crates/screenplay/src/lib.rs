//! Screenplay-pattern acceptance testing for web UIs and HTTP APIs
//!
//! Actors perform tasks and answer questions through the abilities they were
//! granted for one scenario.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ScenarioHarness                                            │
//! │    ├── tag decision (skip before anything is built)         │
//! │    ├── CapabilityRegistry { Web, Api } -> Actor             │
//! │    ├── body: actor.execute(task) / actor.answer(question)   │
//! │    ├── failure evidence (screenshot + error detail)         │
//! │    └── teardown: every ability closed                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  WebAbility   Uninitialized -> Active -> Closed             │
//! │    └── BrowserDriver -> Engine -> Session -> Page           │
//! │  ApiAbility   reqwest client, auth, last exchange           │
//! │  EvidenceCollector                                          │
//! │    {base}/{category}/{scenario}/{browser}/{tag}_{ts}.{ext}  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SuiteRunner: YAML specs x browser matrix, bounded parallel │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod ability;
pub mod actor;
pub mod capability;
pub mod driver;
pub mod error;
pub mod evidence;
pub mod interactions;
pub mod json_case;
pub mod probes;
pub mod question;
pub mod runner;
pub mod scenario;
pub mod spec;
pub mod task;

pub use ability::{Ability, AbilityKind, ApiAbility, LastOperation, SessionState, WebAbility};
pub use actor::Actor;
pub use capability::{Capability, CapabilityRegistry};
pub use driver::{BrowserDriver, DriverError, LaunchOptions, PlaywrightConfig, PlaywrightDriver};
pub use error::{ScreenplayError, ScreenplayResult};
pub use evidence::{EvidenceCollector, EvidencePolicy};
pub use question::Question;
pub use runner::{RunnerConfig, SuiteReport, SuiteRunner};
pub use scenario::{ScenarioHarness, ScenarioInfo, ScenarioOutcome, ScenarioReport};
pub use spec::{TestSpec, TestStep};
pub use task::{Sequence, Task};
