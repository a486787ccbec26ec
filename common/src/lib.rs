//! Types shared between the controller core and anything that talks to it:
//! the ZCL identifiers used by this node and the endpoint description handed
//! to the network stack at registration.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod endpoint;
pub mod zcl;

pub mod prelude {
    pub use crate::{endpoint::*, zcl::*};
}
