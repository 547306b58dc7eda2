pub mod listing;
pub mod user;

pub use listing::{Listing, ListingChanges, ListingDetail, ListingFilter, ListingImage, NewListing};
pub use user::{NewUser, User, UserFlags};
