use chrono::Utc;
use common::{BookingId, MovieId, PrincipalId, TheatreId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Aggregate, Booking, Money, NewBooking, PaymentMode, SeatLayout, SeatSet, Theatre,
};

fn large_hall() -> Theatre {
    let rows: Vec<String> = (b'A'..=b'T').map(|c| (c as char).to_string()).collect();
    let labels: Vec<&str> = rows.iter().map(String::as_str).collect();
    Theatre::new(
        TheatreId::new(),
        MovieId::new(),
        "Bench Hall",
        SeatLayout::grid(&labels, 30).unwrap(),
        Money::from_minor(15_000),
    )
}

fn bench_theatre_claim_release(c: &mut Criterion) {
    let mut theatre = large_hall();
    let seats = SeatSet::parse_request(["A1", "B2", "C3", "D4"]).unwrap();

    c.bench_function("domain/theatre_claim_release", |b| {
        b.iter(|| {
            theatre.try_claim(&seats).unwrap();
            theatre.release(&seats);
        });
    });
}

fn bench_booking_lifecycle(c: &mut Criterion) {
    c.bench_function("domain/booking_create_claim_settle", |b| {
        b.iter(|| {
            let now = Utc::now();
            let (mut booking, _) = Booking::create(
                NewBooking {
                    booking_id: BookingId::new(),
                    payer_id: PrincipalId::new(),
                    theatre_id: TheatreId::new(),
                    movie_id: MovieId::new(),
                    seats: SeatSet::parse_request(["A1", "A2"]).unwrap(),
                    payment_mode: PaymentMode::Direct,
                    amount: Money::from_minor(30_000),
                },
                now,
            )
            .unwrap();
            let events = booking.claim_seats(now).unwrap();
            booking.apply_events(events);
            let events = booking.settle(None, None, now).unwrap();
            booking.apply_events(events);
        });
    });
}

criterion_group!(benches, bench_theatre_claim_release, bench_booking_lifecycle);
criterion_main!(benches);
