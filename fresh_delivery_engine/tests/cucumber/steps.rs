use std::str::FromStr;

use cucumber::{then, when};
use fresh_delivery_engine::{
    db_types::{DeliveryType, Money, OrderStatusType, PayStatus, PaymentMethod, PaymentRecordStatus},
    order_objects::{NewOrderLine, NewOrderRequest},
    test_utils::seed,
    ErrorCategory,
    InventoryLedger,
    OrderManagement,
};

use crate::cucumber::OrderWorld;

/// Parses "2 x Apple, 1 x Banana" into order lines, priced from the catalog the scenario set up.
async fn parse_lines(world: &OrderWorld, lines: &str) -> Vec<NewOrderLine> {
    let mut result = Vec::new();
    for part in lines.split(',') {
        let (qty, name) = part.split_once(" x ").unwrap_or_else(|| panic!("Bad order line: {part}"));
        let name = name.trim();
        let product_id = world.product(name);
        let price: Money = sqlx::query_scalar("SELECT price FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_one(world.system().db.pool())
            .await
            .expect("Error reading price");
        let quantity = qty.trim().parse::<i64>().expect("Bad quantity");
        result.push(NewOrderLine::new(product_id, name, price, quantity));
    }
    result
}

#[when(expr = "user {int} orders {string} with {word} delivery paying by {word}")]
async fn place_order(world: &mut OrderWorld, user_id: i64, lines: String, delivery: String, method: String) {
    let address_id = *world.addresses.get(&user_id).expect("User has no address");
    submit_order(world, user_id, address_id, &lines, &delivery, &method).await;
}

#[when(expr = "user {int} orders {string} to the address of user {int}")]
async fn order_to_foreign_address(world: &mut OrderWorld, user_id: i64, lines: String, owner: i64) {
    let address_id = *world.addresses.get(&owner).expect("User has no address");
    submit_order(world, user_id, address_id, &lines, "standard", "cash").await;
}

async fn submit_order(world: &mut OrderWorld, user_id: i64, address_id: i64, lines: &str, delivery: &str, method: &str) {
    let lines = parse_lines(world, lines).await;
    let request = NewOrderRequest {
        user_id,
        address_id,
        lines,
        delivery_type: DeliveryType::from_str(delivery).expect("Bad delivery type"),
        payment_method: PaymentMethod::from_str(method).expect("Bad payment method"),
        remark: None,
    };
    match world.system().orders.create_order(request).await {
        Ok(created) => {
            world.last_order_id = Some(created.order_id);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e.category()),
    }
}

#[when(expr = "user {int} pays for the order")]
async fn pay_for_order(world: &mut OrderWorld, user_id: i64) {
    let order_id = world.last_order_id();
    match world.system().settlement.pay_order(user_id, order_id).await {
        Ok(_) => world.last_error = None,
        Err(e) => world.last_error = Some(e.category()),
    }
}

#[when(expr = "courier {int} confirms {word} cash for the order")]
async fn confirm_cod(world: &mut OrderWorld, courier: i64, amount: String) {
    let order_id = world.last_order_id();
    let amount = amount.parse::<Money>().expect("Invalid amount");
    match world.system().settlement.confirm_cash_on_delivery(order_id, amount, courier).await {
        Ok(_) => world.last_error = None,
        Err(e) => world.last_error = Some(e.category()),
    }
}

#[when(expr = "the gateway reports payment of {word} with transaction {string}")]
async fn gateway_notification(world: &mut OrderWorld, amount: String, txid: String) {
    let order = world.last_order().await;
    let body = format!(
        r#"{{"order_no":"{}","transaction_id":"{txid}","amount":"{amount}","result":"SUCCESS"}}"#,
        order.order_no.as_str()
    );
    match world.system().settlement.process_gateway_notification(body.as_bytes()).await {
        Ok(_) => world.last_error = None,
        Err(e) => world.last_error = Some(e.category()),
    }
}

#[when(expr = "user {int} cancels the order")]
async fn cancel_order(world: &mut OrderWorld, user_id: i64) {
    let order_id = world.last_order_id();
    match world.system().orders.cancel_order_for_user(user_id, order_id, None).await {
        Ok(_) => world.last_error = None,
        Err(e) => world.last_error = Some(e.category()),
    }
}

#[when(expr = "user {int} confirms receipt")]
async fn confirm_receipt(world: &mut OrderWorld, user_id: i64) {
    let order_id = world.last_order_id();
    match world.system().orders.confirm_receipt(user_id, order_id).await {
        Ok(_) => world.last_error = None,
        Err(e) => world.last_error = Some(e.category()),
    }
}

#[when(expr = "the order is shipped with {string} tracking {string}")]
async fn ship_order(world: &mut OrderWorld, company: String, tracking: String) {
    let order_id = world.last_order_id();
    match world.system().orders.ship_order(order_id, &company, &tracking).await {
        Ok(_) => world.last_error = None,
        Err(e) => world.last_error = Some(e.category()),
    }
}

#[when(expr = "the order is refunded because {string}")]
async fn refund_order(world: &mut OrderWorld, reason: String) {
    let order_id = world.last_order_id();
    match world.system().orders.refund_order(order_id, &reason).await {
        Ok(_) => world.last_error = None,
        Err(e) => world.last_error = Some(e.category()),
    }
}

#[then(expr = "the order succeeds")]
async fn order_succeeds(world: &mut OrderWorld) {
    assert_eq!(world.last_error, None, "Expected the last operation to succeed");
}

#[then(expr = "the request fails with {word}")]
async fn request_fails(world: &mut OrderWorld, category: String) {
    let expected = match category.as_str() {
        "InsufficientStock" => ErrorCategory::InsufficientStock,
        "OrderStatus" => ErrorCategory::OrderStatus,
        "AddressNotOwned" => ErrorCategory::AddressNotOwned,
        "Forbidden" => ErrorCategory::Forbidden,
        "Validation" => ErrorCategory::Validation,
        "SettlementRejected" => ErrorCategory::SettlementRejected,
        other => panic!("Unknown error category {other}"),
    };
    assert_eq!(world.last_error, Some(expected));
}

#[then(expr = "the order subtotal is {word} and the total is {word}")]
async fn check_totals(world: &mut OrderWorld, subtotal: String, total: String) {
    let order = world.last_order().await;
    assert_eq!(order.subtotal, subtotal.parse::<Money>().expect("Invalid subtotal"));
    assert_eq!(order.total_amount, total.parse::<Money>().expect("Invalid total"));
    assert_eq!(order.total_amount, order.subtotal + order.delivery_fee);
    let items = world.system().db.fetch_order_items(order.id).await.expect("Error fetching items");
    let sum: Money = items.iter().map(|i| i.subtotal).sum();
    assert_eq!(sum, order.subtotal);
}

#[then(expr = "the order status is {word}")]
async fn check_status(world: &mut OrderWorld, status: String) {
    let order = world.last_order().await;
    assert_eq!(order.status, OrderStatusType::from_str(&status).expect("Bad status"));
}

#[then(expr = "the payment status is {word}")]
async fn check_pay_status(world: &mut OrderWorld, status: String) {
    let order = world.last_order().await;
    assert_eq!(order.pay_status, PayStatus::from_str(&status).expect("Bad payment status"));
}

#[then(expr = "the order was refunded because {string}")]
async fn check_refund_reason(world: &mut OrderWorld, reason: String) {
    let order = world.last_order().await;
    assert_eq!(order.refund_reason, Some(reason));
    assert!(order.finished_at.is_some());
    assert_eq!(order.cancel_reason, None);
    assert_eq!(order.cancelled_at, None);
}

#[then(expr = "the order was paid {word}")]
async fn check_pay_amount(world: &mut OrderWorld, amount: String) {
    let order = world.last_order().await;
    assert_eq!(order.pay_amount, Some(amount.parse::<Money>().expect("Invalid amount")));
    assert!(order.paid_at.is_some());
}

#[then(expr = "the payment record is {word} expecting {word} with {word} received")]
async fn check_payment_record(world: &mut OrderWorld, status: String, expected: String, actual: String) {
    let order_id = world.last_order_id();
    let record = world
        .system()
        .db
        .fetch_payment_record(order_id)
        .await
        .expect("Error fetching payment record")
        .expect("No payment record");
    let status = match status.as_str() {
        "pending" => PaymentRecordStatus::Pending,
        "confirmed" => PaymentRecordStatus::Confirmed,
        "cancelled" => PaymentRecordStatus::Cancelled,
        other => panic!("Unknown record status {other}"),
    };
    assert_eq!(record.status, status);
    assert_eq!(record.expected_amount, expected.parse::<Money>().expect("Invalid amount"));
    let actual = match actual.as_str() {
        "nothing" => None,
        amount => Some(amount.parse::<Money>().expect("Invalid amount")),
    };
    assert_eq!(record.actual_amount, actual);
}

#[then(expr = "product {string} has {int} in stock")]
async fn check_stock(world: &mut OrderWorld, name: String, stock: i64) {
    let product_id = world.product(&name);
    let current = world.system().db.fetch_stock(product_id).await.expect("Error fetching stock");
    assert_eq!(current, Some(stock));
}

#[then(expr = "there are {int} orders and {int} order items")]
async fn check_row_counts(world: &mut OrderWorld, orders: i64, items: i64) {
    let pool = world.system().db.pool();
    assert_eq!(seed::count_orders(pool).await, orders);
    assert_eq!(seed::count_order_items(pool).await, items);
}

#[then(expr = "the cart of user {int} holds {int} lines")]
async fn check_cart(world: &mut OrderWorld, user_id: i64, lines: usize) {
    let ids = seed::cart_product_ids(world.system().db.pool(), user_id).await;
    assert_eq!(ids.len(), lines);
}
