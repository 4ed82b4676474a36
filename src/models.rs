pub mod draws;
pub mod investments;
pub mod referrals;
pub mod rounds;
pub mod transactions;
pub mod users;
pub mod verifications;
