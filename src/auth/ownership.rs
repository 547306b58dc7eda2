use crate::database::models::{Listing, ListingDetail, User};

/// A resource with a single owning user.
pub trait Owned {
    fn owner_id(&self) -> i32;
}

impl Owned for Listing {
    fn owner_id(&self) -> i32 {
        self.user_id
    }
}

impl Owned for ListingDetail {
    fn owner_id(&self) -> i32 {
        self.listing.user_id
    }
}

/// The owner of a resource and staff may change it; nobody else may.
pub fn may_modify<R: Owned + ?Sized>(actor: &User, resource: &R) -> bool {
    actor.id == resource.owner_id() || actor.is_staff
}
