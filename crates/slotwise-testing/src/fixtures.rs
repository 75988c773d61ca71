//! Seed data builders for directory entities.

use chrono::{NaiveTime, Weekday};
use slotwise_core::{
    storage::MemoryDirectory, Customer, CustomerId, Salon, SalonId, Service, ServiceId, Stylist,
    StylistId, WorkingHours,
};

/// One salon with a stylist, a service, and a customer, ready to book.
#[derive(Debug, Clone)]
pub struct SalonFixture {
    /// The seeded salon.
    pub salon: Salon,
    /// A stylist working at the salon.
    pub stylist: Stylist,
    /// A service the salon offers.
    pub service: Service,
    /// A customer with a linked notification channel.
    pub customer: Customer,
}

impl SalonFixture {
    /// Seeds a standard salon into the directory.
    pub async fn seed(directory: &MemoryDirectory) -> Self {
        Self::seed_with_auto_approve(directory, false).await
    }

    /// Seeds a salon with the auto-approval flag set as given.
    pub async fn seed_with_auto_approve(directory: &MemoryDirectory, auto_approve: bool) -> Self {
        let salon = Salon {
            id: SalonId::new(),
            name: "Test Salon".to_string(),
            address: "Valiasr St, Tehran".to_string(),
            auto_approve_appointments: auto_approve,
        };
        let stylist = Stylist {
            id: StylistId::new(),
            salon_id: salon.id,
            first_name: "Reza".to_string(),
            last_name: "Ahmadi".to_string(),
        };
        let service = Service {
            id: ServiceId::new(),
            salon_id: salon.id,
            name: "Men's haircut".to_string(),
            price: 150_000,
            duration_minutes: 30,
        };
        let customer = Customer {
            id: CustomerId::new(),
            first_name: "Ali".to_string(),
            last_name: "Mohammadi".to_string(),
            phone: "09121234567".to_string(),
            channel_id: Some("chat-1001".to_string()),
        };

        directory.insert_salon(salon.clone()).await;
        directory.insert_stylist(stylist.clone()).await;
        directory.insert_service(service.clone()).await;
        directory.insert_customer(customer.clone()).await;

        Self { salon, stylist, service, customer }
    }

    /// Adds a working window for the fixture stylist on every weekday.
    pub async fn seed_full_week_hours(&self, directory: &MemoryDirectory) {
        for weekday in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ] {
            directory
                .insert_working_hours(WorkingHours {
                    stylist_id: self.stylist.id,
                    weekday,
                    start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                    is_active: true,
                })
                .await;
        }
    }
}
