//! Detection adapters.
//!
//! | Module   | Notes                                                                 |
//! |----------|-----------------------------------------------------------------------|
//! | `remote` | JSON over WebSocket to `mwp-detect-server`, frames passed by path     |
//! | `mock`   | scripted results for tests, optional periodic hits for dry runs       |

pub mod mock;
pub mod remote;
