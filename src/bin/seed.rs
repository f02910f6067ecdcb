use beacon::{
    auth::AuthService,
    domain::{
        AcademicInfo, AdditionalInfo, ApprovalStatus, Gender, GatewayConfirmation, NewPayment,
        NewUser, PaymentRecordStatus, PersonalInfo, PlayLevel, SectionUpdate, SportEntry, UserRole,
    },
    repository::{
        ApplicationRepository, PaymentRepository, SqliteApplicationRepository,
        SqlitePaymentRepository, SqliteUserRepository, UserRepository,
    },
};
use chrono::{Duration, Utc};
use clap::Parser;
use fake::{
    faker::{address::en::CityName, address::en::StreetName, name::en::Name, phone_number::en::CellNumber},
    Fake,
};
use sqlx::sqlite::SqlitePoolOptions;

const SPORTS: &[(&str, &[&str])] = &[
    ("Football", &["Goalkeeper", "Defender", "Midfielder", "Forward"]),
    ("Cricket", &["Batsman", "Bowler", "All-rounder", "Wicket-keeper"]),
    ("Athletics", &["Sprinter", "Long distance", "Jumper"]),
    ("Badminton", &["Singles", "Doubles"]),
];

const LEVELS: &[PlayLevel] = &[
    PlayLevel::School,
    PlayLevel::District,
    PlayLevel::State,
    PlayLevel::National,
];

/// Fills a development database with an admin and fake applicants.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// SQLite database to seed.
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://beacon.db?mode=rwc")]
    database_url: String,

    /// Number of applicants to create.
    #[arg(long, default_value_t = 20)]
    applicants: usize,

    /// Registration fee recorded for paid applicants, in paise.
    #[arg(long, default_value_t = 50_000)]
    fee: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("🌱 Seeding {}...", args.database_url);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let user_repo = SqliteUserRepository::new(db_pool.clone());
    let application_repo = SqliteApplicationRepository::new(db_pool.clone());
    let payment_repo = SqlitePaymentRepository::new(db_pool.clone());

    let admin = user_repo.create(NewUser {
        name: "Admin User".to_string(),
        email: "admin@beacon.local".to_string(),
        sport: None,
        password_hash: AuthService::hash_password("admin123").await?,
        role: UserRole::Admin,
        is_verified: true,
    }).await?;
    println!("  ✅ Created admin ({} / admin123)", admin.email);

    let password_hash = AuthService::hash_password("password123").await?;
    let mut paid = 0;

    for i in 0..args.applicants {
        let name: String = Name().fake();
        let (sport, positions) = SPORTS[i % SPORTS.len()];
        let user = user_repo.create(NewUser {
            name: name.clone(),
            email: format!("applicant{}@example.com", i + 1),
            sport: Some(sport.to_string()),
            password_hash: password_hash.clone(),
            role: UserRole::User,
            is_verified: true,
        }).await?;

        let age_days = (12 * 365..18 * 365i64).fake::<i64>();
        let dob = (Utc::now() - Duration::days(age_days)).date_naive();
        let street: String = StreetName().fake();
        let city: String = CityName().fake();

        let sections = vec![
            SectionUpdate::PersonalInfo(PersonalInfo {
                full_name: Some(name),
                dob: Some(dob),
                gender: Some(if i % 2 == 0 { Gender::Male } else { Gender::Female }),
                phone: Some(CellNumber().fake::<String>()),
                email: Some(user.email.clone()),
                address: Some(format!("{} {}, {}", (1..200u32).fake::<u32>(), street, city)),
                parent_name: Some(Name().fake::<String>()),
            }),
            SectionUpdate::AcademicInfo(AcademicInfo {
                is_studying: Some(true),
                school_name: Some(format!("{} Public School", city)),
                grade: Some(format!("{}", (6..13u32).fake::<u32>())),
            }),
            SectionUpdate::SportsInfo(vec![SportEntry {
                sport_type: Some(sport.to_string()),
                position: Some(positions[i % positions.len()].to_string()),
                club_name: Some(format!("{} {} Club", city, sport)),
                level: Some(LEVELS[i % LEVELS.len()]),
                experience: Some((1..8i64).fake::<i64>()),
                achievements: None,
                certificates: Vec::new(),
            }]),
            SectionUpdate::AdditionalInfo(AdditionalInfo {
                father_income: Some((50_000..600_000i64).fake::<i64>()),
                mother_income: Some((0..300_000i64).fake::<i64>()),
                ..Default::default()
            }.with_derived_total()?),
        ];

        // Later applicants stop part way through the form.
        let filled = if i % 5 == 4 { 2 } else { sections.len() };
        let mut application = None;
        for section in sections.iter().take(filled) {
            application = Some(application_repo.save_section(user.id, section).await?);
        }
        let Some(application) = application else { continue };

        if filled < sections.len() || i % 3 == 2 {
            continue;
        }

        let order_id = format!("order_seed{:06}", i + 1);
        application_repo.set_order(application.id, &order_id, args.fee).await?;

        if i % 4 == 1 {
            payment_repo.create(NewPayment {
                user_id: user.id,
                application_id: application.id,
                razorpay_order_id: order_id.clone(),
                razorpay_payment_id: None,
                razorpay_signature: None,
                amount: args.fee,
                currency: "INR".to_string(),
                status: PaymentRecordStatus::Failed,
            }).await?;
        }

        payment_repo.record_verified(
            &GatewayConfirmation {
                order_id,
                payment_id: format!("pay_seed{:06}", i + 1),
                signature: "seeded".to_string(),
            },
            "INR",
        ).await?;
        paid += 1;

        let approval = match i % 4 {
            0 => ApprovalStatus::Approved,
            1 => ApprovalStatus::Viewed,
            _ => continue,
        };
        application_repo.update_approval(application.id, approval).await?;
    }

    println!("  ✅ Created {} applicants ({} paid)", args.applicants, paid);
    println!("\n✨ Database seeding complete!");
    println!("  Admin: admin@beacon.local / admin123");
    println!("  Applicants: applicant1@example.com ... / password123");

    Ok(())
}
