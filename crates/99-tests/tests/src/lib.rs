//! End-to-end tests: the host driver talking to the firmware simulator over
//! a shared command ring, fence region and event log.

#[cfg(test)]
mod testbed;

#[cfg(test)]
mod queue_lifecycle;

#[cfg(test)]
mod fences;

#[cfg(test)]
mod suspend_resume;

#[cfg(test)]
mod log_readback;
