use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Name).string().not_null())
                    .col(
                        ColumnDef::new(Users::Email)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::PasswordHash).string())
                    .col(ColumnDef::new(Users::FaceTemplate).text())
                    .col(ColumnDef::new(Users::DeviceTrust).json().not_null())
                    .col(ColumnDef::new(Users::IsActive).boolean().not_null())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Create api_keys table
        manager
            .create_table(
                Table::create()
                    .table(ApiKeys::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApiKeys::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ApiKeys::KeyId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ApiKeys::KeyHash)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ApiKeys::KeyPrefix).string().not_null())
                    .col(ColumnDef::new(ApiKeys::Name).string().not_null())
                    .col(ColumnDef::new(ApiKeys::CustomerId).string().not_null())
                    .col(ColumnDef::new(ApiKeys::Environment).string().not_null())
                    .col(ColumnDef::new(ApiKeys::Status).string().not_null())
                    .col(ColumnDef::new(ApiKeys::Plan).string().not_null())
                    .col(ColumnDef::new(ApiKeys::RateLimit).integer().not_null())
                    .col(ColumnDef::new(ApiKeys::WebhookUrl).string())
                    .col(ColumnDef::new(ApiKeys::WebhookSecret).string())
                    .col(
                        ColumnDef::new(ApiKeys::WebhookRetryPolicy)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ApiKeys::WebhookLastDelivery).json())
                    .col(ColumnDef::new(ApiKeys::DataRetention).string().not_null())
                    .col(
                        ColumnDef::new(ApiKeys::DisableVideoStorage)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApiKeys::RequireExtraVerification)
                            .boolean()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ApiKeys::MonthlyUsage).big_integer().not_null())
                    .col(ColumnDef::new(ApiKeys::DailyUsage).big_integer().not_null())
                    .col(ColumnDef::new(ApiKeys::DailyUsageDate).string().not_null())
                    .col(ColumnDef::new(ApiKeys::SuccessCount).big_integer().not_null())
                    .col(ColumnDef::new(ApiKeys::FailureCount).big_integer().not_null())
                    .col(ColumnDef::new(ApiKeys::LastUsedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ApiKeys::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApiKeys::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_api_keys_customer_id")
                            .from(ApiKeys::Table, ApiKeys::CustomerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // SQLite cannot represent a non-unique index as a table-level
        // CONSTRAINT, so these indexes are created separately.
        manager
            .create_index(
                Index::create()
                    .name("idx_api_keys_customer_status")
                    .table(ApiKeys::Table)
                    .col(ApiKeys::CustomerId)
                    .col(ApiKeys::Status)
                    .to_owned(),
            )
            .await?;

        // Create verification_sessions table
        manager
            .create_table(
                Table::create()
                    .table(VerificationSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VerificationSessions::SessionId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VerificationSessions::ApiKeyId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationSessions::CustomerId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationSessions::Status)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationSessions::Confidence)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationSessions::SignalLiveness)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationSessions::SignalReplay)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationSessions::SignalBehavior)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationSessions::ReasonCodes)
                            .json()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationSessions::VerificationUrl)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationSessions::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(VerificationSessions::DeviceInfo).json())
                    .col(ColumnDef::new(VerificationSessions::IpAddress).string())
                    .col(
                        ColumnDef::new(VerificationSessions::CompletedAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(VerificationSessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationSessions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_verification_sessions_api_key_id")
                            .from(
                                VerificationSessions::Table,
                                VerificationSessions::ApiKeyId,
                            )
                            .to(ApiKeys::Table, ApiKeys::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_verification_sessions_api_key_status")
                    .table(VerificationSessions::Table)
                    .col(VerificationSessions::ApiKeyId)
                    .col(VerificationSessions::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_verification_sessions_customer_created")
                    .table(VerificationSessions::Table)
                    .col(VerificationSessions::CustomerId)
                    .col(VerificationSessions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Create login_attempts table (append-only audit)
        manager
            .create_table(
                Table::create()
                    .table(LoginAttempts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LoginAttempts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LoginAttempts::DeviceId).string().not_null())
                    .col(ColumnDef::new(LoginAttempts::Success).boolean().not_null())
                    .col(ColumnDef::new(LoginAttempts::FailureReason).string())
                    .col(ColumnDef::new(LoginAttempts::MotionScore).double().not_null())
                    .col(ColumnDef::new(LoginAttempts::TextureScore).double().not_null())
                    .col(
                        ColumnDef::new(LoginAttempts::ChallengePassed)
                            .boolean()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LoginAttempts::QualityScore).double().not_null())
                    .col(ColumnDef::new(LoginAttempts::UserId).string())
                    .col(
                        ColumnDef::new(LoginAttempts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Create login_history table
        manager
            .create_table(
                Table::create()
                    .table(LoginHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LoginHistory::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LoginHistory::UserId).string().not_null())
                    .col(ColumnDef::new(LoginHistory::DeviceId).string().not_null())
                    .col(ColumnDef::new(LoginHistory::AuthMethod).string().not_null())
                    .col(ColumnDef::new(LoginHistory::Success).boolean().not_null())
                    .col(ColumnDef::new(LoginHistory::IpAddress).string())
                    .col(ColumnDef::new(LoginHistory::Location).string())
                    .col(
                        ColumnDef::new(LoginHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_login_history_user_id")
                            .from(LoginHistory::Table, LoginHistory::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_login_history_user_id")
                    .table(LoginHistory::Table)
                    .col(LoginHistory::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LoginHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LoginAttempts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VerificationSessions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApiKeys::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Name,
    Email,
    PasswordHash,
    FaceTemplate,
    DeviceTrust,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ApiKeys {
    Table,
    Id,
    KeyId,
    KeyHash,
    KeyPrefix,
    Name,
    CustomerId,
    Environment,
    Status,
    Plan,
    RateLimit,
    WebhookUrl,
    WebhookSecret,
    WebhookRetryPolicy,
    WebhookLastDelivery,
    DataRetention,
    DisableVideoStorage,
    RequireExtraVerification,
    MonthlyUsage,
    DailyUsage,
    DailyUsageDate,
    SuccessCount,
    FailureCount,
    LastUsedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum VerificationSessions {
    Table,
    SessionId,
    ApiKeyId,
    CustomerId,
    Status,
    Confidence,
    SignalLiveness,
    SignalReplay,
    SignalBehavior,
    ReasonCodes,
    VerificationUrl,
    ExpiresAt,
    DeviceInfo,
    IpAddress,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum LoginAttempts {
    Table,
    Id,
    DeviceId,
    Success,
    FailureReason,
    MotionScore,
    TextureScore,
    ChallengePassed,
    QualityScore,
    UserId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum LoginHistory {
    Table,
    Id,
    UserId,
    DeviceId,
    AuthMethod,
    Success,
    IpAddress,
    Location,
    CreatedAt,
}
