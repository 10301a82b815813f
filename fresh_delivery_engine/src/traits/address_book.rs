use crate::{db_types::Address, traits::OrderGatewayError};

/// Read access to the address book, which is owned by another subsystem.
#[allow(async_fn_in_trait)]
pub trait AddressBook {
    async fn fetch_address(&self, address_id: i64) -> Result<Option<Address>, OrderGatewayError>;
}
